// registration_syn_quick.rs - antsRegistrationSyNQuick.sh: scripted quick SyN registration

use std::path::Path;

use crate::core::{
    format_float, ArgBuilder, Bindings, FieldKind, FieldSpec, Result, Schema, SchemaBuilder,
};

use super::common::{insert_file, num_threads_field};
use super::registration_syn::TRANSFORM_TYPES;
use super::traits::{OutputMap, Task};

/// Transform types that stop before the deformable stage
const LINEAR_TYPES: &[&str] = &["t", "r", "a"];

#[derive(Debug)]
pub struct RegistrationSynQuick {
    schema: Schema,
}

impl RegistrationSynQuick {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("registration_syn_quick")
            .field(
                FieldSpec::new(
                    "dimensionality",
                    FieldKind::Int,
                    "force image dimensionality (2 or 3)",
                )
                .mandatory()
                .allowed(vec![2, 3]),
            )
            .field(FieldSpec::new("fixed_image", FieldKind::File, "fixed image").mandatory())
            .field(FieldSpec::new("moving_image", FieldKind::File, "moving image").mandatory())
            .field(
                FieldSpec::new("output_prefix", FieldKind::Text, "prefix for output files")
                    .default("output"),
            )
            .field(num_threads_field())
            .field(FieldSpec::new(
                "initial_transforms",
                FieldKind::list(FieldKind::File),
                "initial transforms",
            ))
            .field(
                FieldSpec::new("transform_type", FieldKind::Text, "transform type")
                    .default("s")
                    .allowed(TRANSFORM_TYPES.to_vec()),
            )
            .field(
                FieldSpec::new(
                    "num_histogram_bins",
                    FieldKind::Int,
                    "number of histogram bins in SyN stage",
                )
                .default(32),
            )
            .field(
                FieldSpec::new(
                    "spline_distance",
                    FieldKind::Float,
                    "spline distance for deformable B-spline SyN transform",
                )
                .default(26),
            )
            .field(
                FieldSpec::new(
                    "gradient_step_size",
                    FieldKind::Float,
                    "gradient step size for SyN and B-spline SyN",
                )
                .default(0.1),
            )
            .field(FieldSpec::new("fixed_mask", FieldKind::File, "mask applied to the fixed image"))
            .field(
                FieldSpec::new("moving_mask", FieldKind::File, "mask applied to the moving image")
                    .requires(&["fixed_mask"]),
            )
            .field(
                FieldSpec::new("precision", FieldKind::Text, "use float or double precision")
                    .default("double")
                    .allowed(vec!["float", "double"]),
            )
            .field(
                FieldSpec::new("use_histogram_matching", FieldKind::Bool, "use histogram matching")
                    .default(false),
            )
            .field(
                FieldSpec::new("use_reproducible_mode", FieldKind::Bool, "use reproducible mode")
                    .default(false),
            )
            .field(FieldSpec::new("random_seed", FieldKind::Int, "fix random seed"))
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for RegistrationSynQuick {
    fn name(&self) -> &'static str {
        "registration_syn_quick"
    }

    fn executable(&self) -> &'static str {
        "antsRegistrationSyNQuick.sh"
    }

    fn description(&self) -> &'static str {
        "Quick SyN registration through the ANTs helper script"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let transform_type = bound.require_str("transform_type")?;

        let mut args = ArgBuilder::new();
        args.opt("-d", bound.require_render("dimensionality")?)
            .opt("-f", bound.require_render("fixed_image")?)
            .opt("-m", bound.require_render("moving_image")?)
            .opt("-o", bound.require_render("output_prefix")?)
            .opt("-n", bound.require_render("num_threads")?);
        for transform in bound.get_str_list("initial_transforms").unwrap_or_default() {
            args.opt("-i", transform);
        }
        args.opt("-t", transform_type);

        if transform_type.contains('s') {
            args.opt("-r", bound.require_render("num_histogram_bins")?);
        }
        if transform_type.contains('b') {
            args.opt("-s", format_float(bound.require_float("spline_distance")?));
        }
        if transform_type.contains('s') || transform_type.contains('b') {
            args.opt("-g", format_float(bound.require_float("gradient_step_size")?));
        }

        if let Some(fixed) = bound.render("fixed_mask") {
            match bound.render("moving_mask") {
                Some(moving) => args.opt("-x", format!("{},{}", fixed, moving)),
                None => args.opt("-x", fixed),
            };
        }

        let precision = bound.require_str("precision")?;
        args.opt("-p", &precision[..1])
            .opt_bool("-j", bound.flag("use_histogram_matching"))
            .opt_bool("-y", bound.flag("use_reproducible_mode"))
            .opt_if("-e", bound.render("random_seed"));
        Ok(args.build())
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let prefix = bound.require_str("output_prefix")?;
        let mut outputs = OutputMap::new();
        insert_file(
            &mut outputs,
            "warped_moving_image",
            work_dir,
            &format!("{}Warped.nii.gz", prefix),
        );
        insert_file(
            &mut outputs,
            "warped_fixed_image",
            work_dir,
            &format!("{}InverseWarped.nii.gz", prefix),
        );
        insert_file(
            &mut outputs,
            "affine_transform",
            work_dir,
            &format!("{}0GenericAffine.mat", prefix),
        );
        if !LINEAR_TYPES.contains(&bound.require_str("transform_type")?) {
            insert_file(
                &mut outputs,
                "forward_warp_field",
                work_dir,
                &format!("{}1Warp.nii.gz", prefix),
            );
            insert_file(
                &mut outputs,
                "inverse_warp_field",
                work_dir,
                &format!("{}1InverseWarp.nii.gz", prefix),
            );
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParameterSet, TaskError};

    fn base() -> ParameterSet {
        ParameterSet::new()
            .with("dimensionality", 3)
            .with("fixed_image", "reference.nii")
            .with("moving_image", "structural.nii")
    }

    #[test]
    fn test_default_command() {
        let task = RegistrationSynQuick::new().unwrap();
        let argv = task.command_line(&base()).unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "antsRegistrationSyNQuick.sh",
                "-d",
                "3",
                "-f",
                "reference.nii",
                "-m",
                "structural.nii",
                "-o",
                "output",
                "-n",
                "1",
                "-t",
                "s",
                "-r",
                "32",
                "-g",
                "0.1",
                "-p",
                "d",
                "-j",
                "0",
                "-y",
                "0",
            ]
        );
    }

    #[test]
    fn test_bspline_options() {
        let task = RegistrationSynQuick::new().unwrap();
        let params = base()
            .with("transform_type", "b")
            .with("spline_distance", 32)
            .with("gradient_step_size", 0.2)
            .with("random_seed", 42);
        let argv = task.command_line(&params).unwrap().argv();
        let line = argv.join(" ");
        assert!(line.contains("-t b -s 32 -g 0.2 -p d"));
        assert!(line.ends_with("-e 42"));
        assert!(!argv.contains(&"-r".to_string()));
    }

    #[test]
    fn test_masks_and_initial_transforms() {
        let task = RegistrationSynQuick::new().unwrap();
        let argv = task
            .command_line(&base().with("fixed_mask", "mask.nii"))
            .unwrap()
            .argv();
        assert!(argv.windows(2).any(|w| w == ["-x", "mask.nii"]));

        let argv = task
            .command_line(
                &base()
                    .with("fixed_mask", "fmask.nii")
                    .with("moving_mask", "mmask.nii")
                    .with("initial_transforms", vec!["a.mat", "b.mat"]),
            )
            .unwrap()
            .argv();
        assert!(argv.windows(2).any(|w| w == ["-x", "fmask.nii,mmask.nii"]));
        assert_eq!(&argv[11..15], &["-i", "a.mat", "-i", "b.mat"]);

        let err = task
            .command_line(&base().with("moving_mask", "mmask.nii"))
            .unwrap_err();
        assert!(matches!(err, TaskError::UnmetDependency { .. }));
    }

    #[test]
    fn test_linear_types_have_no_warp_fields() {
        let task = RegistrationSynQuick::new().unwrap();
        let outputs = task
            .outputs(&base().with("transform_type", "a"), Path::new("/w"))
            .unwrap();
        assert_eq!(
            outputs["affine_transform"].as_path().unwrap(),
            Path::new("/w/output0GenericAffine.mat")
        );
        assert!(!outputs.contains_key("forward_warp_field"));

        let outputs = task
            .outputs(&base().with("output_prefix", "sub01_"), Path::new("/w"))
            .unwrap();
        assert_eq!(
            outputs["forward_warp_field"].as_path().unwrap(),
            Path::new("/w/sub01_1Warp.nii.gz")
        );
        assert_eq!(
            outputs["inverse_warp_field"].as_path().unwrap(),
            Path::new("/w/sub01_1InverseWarp.nii.gz")
        );
        assert_eq!(
            outputs["warped_fixed_image"].as_path().unwrap(),
            Path::new("/w/sub01_InverseWarped.nii.gz")
        );
    }
}
