// mod.rs - Task wrappers around the ANTs command-line executables

pub mod ai;
pub mod apply_transforms;
pub mod atropos;
pub mod common;
pub mod create_jacobian_determinant_image;
pub mod image_math;
pub mod multiply_images;
pub mod n4_bias_field_correction;
pub mod registration;
pub mod registration_syn;
pub mod registration_syn_quick;
pub mod registry;
pub mod threshold_image;
pub mod traits;

// Re-export main types for convenience
pub use ai::AntsAi;
pub use apply_transforms::ApplyTransforms;
pub use atropos::Atropos;
pub use create_jacobian_determinant_image::CreateJacobianDeterminantImage;
pub use image_math::ImageMath;
pub use multiply_images::MultiplyImages;
pub use n4_bias_field_correction::N4BiasFieldCorrection;
pub use registration::{Registration, RegistrationPlan};
pub use registration_syn::RegistrationSyn;
pub use registration_syn_quick::RegistrationSynQuick;
pub use registry::TaskRegistry;
pub use threshold_image::ThresholdImage;
pub use traits::{OutputMap, OutputValue, Task, TaskPlan};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParameterSet, TaskError};
    use std::path::Path;

    fn multiply() -> ParameterSet {
        ParameterSet::new()
            .with("dimension", 3)
            .with("first_input", "moving2.nii")
            .with("second_input", 0.25)
            .with("output_product_image", "out.nii.gz")
    }

    #[test]
    fn test_multiply_images_command() {
        let task = MultiplyImages::new().unwrap();
        let cmd = task.command_line(&multiply()).unwrap();
        assert_eq!(
            cmd.argv(),
            vec!["MultiplyImages", "3", "moving2.nii", "0.25", "out.nii.gz"]
        );
        assert_eq!(
            cmd.env.get("ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS").map(String::as_str),
            Some("1")
        );

        let cmd = task.command_line(&multiply().with("num_threads", 4)).unwrap();
        assert_eq!(
            cmd.to_shell_string(),
            "ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS=4 MultiplyImages 3 moving2.nii 0.25 out.nii.gz"
        );
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let registry = TaskRegistry::new().unwrap();
        let task = registry.require_task("multiply_images").unwrap();
        let first = task.compile(&multiply(), Path::new("/w")).unwrap();
        let second = task.compile(&multiply(), Path::new("/w")).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.outputs["output_product_image"].as_path().unwrap(),
            Path::new("/w/out.nii.gz")
        );
        assert_eq!(first.command_line().argv(), first.argv);
    }

    #[test]
    fn test_missing_field_produces_no_tokens() {
        let task = MultiplyImages::new().unwrap();
        let mut params = multiply();
        params.remove("first_input");
        let err = task.command_line(&params).unwrap_err();
        assert_eq!(err, TaskError::missing("first_input"));
        assert!(task.compile(&params, Path::new("/w")).is_err());
    }

    #[test]
    fn test_threshold_image_modes() {
        let task = ThresholdImage::new().unwrap();
        let params = ParameterSet::new()
            .with("input_image", "structural.nii")
            .with("th_low", 0.5)
            .with("th_high", 1.0)
            .with("inside_value", 1)
            .with("outside_value", 0);
        let argv = task.command_line(&params).unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "ThresholdImage",
                "3",
                "structural.nii",
                "structural_resampled.nii",
                "0.5",
                "1",
                "1",
                "0",
            ]
        );

        let params = ParameterSet::new()
            .with("input_image", "structural.nii")
            .with("mode", "Kmeans")
            .with("num_thresholds", 3)
            .with("input_mask", "mask.nii")
            .with("output_image", "classes.nii");
        let argv = task.command_line(&params).unwrap().argv();
        assert_eq!(
            argv,
            vec!["ThresholdImage", "3", "structural.nii", "classes.nii", "Kmeans", "3", "mask.nii"]
        );

        let err = task
            .command_line(&params.clone().with("th_low", 0.5).with("th_high", 1.0))
            .unwrap_err();
        assert!(matches!(err, TaskError::MutuallyExclusiveViolation { .. }));

        let err = task
            .command_line(&ParameterSet::new().with("input_image", "structural.nii"))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidValue { .. }));
    }

    #[test]
    fn test_image_math_and_jacobian_templates() {
        let task = ImageMath::new().unwrap();
        let params = ParameterSet::new()
            .with("operation", "+")
            .with("op1", "/data/structural.nii.gz")
            .with("op2", 2);
        let plan = task.compile(&params, Path::new("/w")).unwrap();
        assert_eq!(
            plan.argv,
            vec!["ImageMath", "3", "structural_maths.nii.gz", "+", "/data/structural.nii.gz", "2"]
        );
        assert_eq!(
            plan.outputs["output_image"].as_path().unwrap(),
            Path::new("/w/structural_maths.nii.gz")
        );

        let task = CreateJacobianDeterminantImage::new().unwrap();
        let params = ParameterSet::new()
            .with("dimensionality", 3)
            .with("warp_field", "ants_Warp.nii.gz")
            .with("calculate_log_jacobian", true);
        let argv = task.command_line(&params).unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "CreateJacobianDeterminantImage",
                "3",
                "ants_Warp.nii.gz",
                "ants_Warp_jac.nii.gz",
                "1",
                "0",
            ]
        );
    }

    #[test]
    fn test_every_registered_task_rejects_unknown_fields() {
        let registry = TaskRegistry::new().unwrap();
        for (name, _, _) in registry.list_tasks() {
            let task = registry.require_task(&name).unwrap();
            let err = task
                .command_line(&ParameterSet::new().with("no_such_field", 1))
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    TaskError::MissingMandatoryField { .. } | TaskError::UnknownField { .. }
                ),
                "{} returned {:?}",
                name,
                err
            );
        }
    }
}
