//! The fixed override lists applied when staging each phase's config.

use super::Override;
use std::path::Path;

/// Sub-directory of the output tree the reconstruction phases read and write.
pub const ONLINE_EXPERIMENT: &str = "nerf_with_bundletrack_online";

/// Key in the tracking config holding the far depth clip.
pub const DEPTH_FAR_KEY: &str = "depth_processing.zfar";

/// Key in the tracking config holding the mask erosion radius.
pub const ERODE_MASK_KEY: &str = "erode_mask";

pub fn experiment_dir(out_dir: &Path) -> String {
    format!("{}/{}", out_dir.display(), ONLINE_EXPERIMENT)
}

/// Tracking parameters for one-video object reconstruction.
pub fn tracking_overrides(out_dir: &Path, debug_level: i64) -> Vec<Override> {
    vec![
        Override::new("SPDLOG", debug_level),
        Override::new(DEPTH_FAR_KEY, 2),
        Override::new("depth_processing.percentile", 95),
        Override::new(ERODE_MASK_KEY, 3),
        Override::new("debug_dir", format!("{}/", out_dir.display())),
        Override::new("bundle.max_BA_frames", 10),
        Override::new("bundle.max_optimized_feature_loss", 0.03),
        Override::new("feature_corres.max_dist_neighbor", 0.02),
        Override::new("feature_corres.max_normal_neighbor", 30),
        Override::new("feature_corres.max_dist_no_neighbor", 0.01),
        Override::new("feature_corres.max_normal_no_neighbor", 20),
        Override::new("feature_corres.map_points", true),
        Override::new("feature_corres.resize", 400),
        Override::new("feature_corres.rematch_after_nerf", true),
        Override::new("keyframe.min_rot", 5),
        Override::new("ransac.inlier_dist", 0.01),
        Override::new("ransac.inlier_normal_angle", 20),
        Override::new("ransac.max_trans_neighbor", 0.05),
        Override::new("ransac.max_rot_deg_neighbor", 30),
        Override::new("ransac.max_trans_no_neighbor", 0.01),
        Override::new("ransac.max_rot_no_neighbor", 10),
        Override::new("p2p.max_dist", 0.02),
        Override::new("p2p.max_normal_angle", 45),
    ]
}

/// Reconstruction parameters for the online phase. The far clip is not part
/// of this list; it is always copied from the tracking config.
pub fn online_reconstruction_overrides(out_dir: &Path) -> Vec<Override> {
    let datadir = experiment_dir(out_dir);
    vec![
        Override::new("continual", true),
        Override::new("trunc_start", 0.01),
        Override::new("trunc", 0.01),
        Override::new("mesh_resolution", 0.005),
        Override::new("down_scale_ratio", 1),
        Override::new("fs_sdf", 0.1),
        Override::new("datadir", datadir.clone()),
        Override::new("notes", ""),
        Override::new("expname", ONLINE_EXPERIMENT),
        Override::new("save_dir", datadir),
    ]
}

/// Reconstruction parameters for global refinement: more steps and samples,
/// a finer grid, and visualization only every `i_img` steps.
pub fn global_refinement_overrides(out_dir: &Path) -> Vec<Override> {
    let datadir = experiment_dir(out_dir);
    let i_img = 200;
    vec![
        Override::new("n_step", 1000),
        Override::new("N_samples", 64),
        Override::new("N_samples_around_depth", 256),
        Override::new("first_frame_weight", 1),
        Override::new("down_scale_ratio", 1),
        Override::new("finest_res", 256),
        Override::new("num_levels", 16),
        Override::new("mesh_resolution", 0.005),
        Override::new("n_train_image", 500),
        Override::new("fs_sdf", 0.1),
        Override::new("frame_features", 2),
        Override::new("rgb_weight", 100),
        Override::new("i_img", i_img),
        Override::new("i_mesh", i_img),
        Override::new("i_nerf_normals", i_img),
        Override::new("i_save_ray", i_img),
        Override::new("datadir", datadir.clone()),
        Override::new("save_dir", datadir),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn test_debug_dir_has_trailing_slash() {
        let list = tracking_overrides(Path::new("/tmp/run"), 2);
        let debug_dir = list.iter().find(|o| o.key == "debug_dir").unwrap();
        assert_eq!(debug_dir.value, Value::from("/tmp/run/"));
    }

    #[test]
    fn test_online_paths_point_into_experiment_dir() {
        let list = online_reconstruction_overrides(Path::new("/tmp/run"));
        for key in ["datadir", "save_dir"] {
            let o = list.iter().find(|o| o.key == key).unwrap();
            assert_eq!(o.value, Value::from("/tmp/run/nerf_with_bundletrack_online"));
        }
        assert!(list.iter().all(|o| o.key != "far"));
    }

    #[test]
    fn test_global_intervals_follow_i_img() {
        let list = global_refinement_overrides(Path::new("/out"));
        for key in ["i_mesh", "i_nerf_normals", "i_save_ray"] {
            let o = list.iter().find(|o| o.key == key).unwrap();
            assert_eq!(o.value, Value::from(200));
        }
    }
}
