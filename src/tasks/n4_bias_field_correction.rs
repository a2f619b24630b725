// n4_bias_field_correction.rs - N4BiasFieldCorrection: intensity non-uniformity correction

use std::path::Path;

use crate::core::format::join_floats;
use crate::core::{
    bracket, format_float, join_x, ArgBuilder, Bindings, FieldKind, FieldSpec, Result, Schema,
    SchemaBuilder, TaskError,
};

use super::common::{check_positive, insert_file, num_threads_field, output_name};
use super::traits::{OutputMap, Task};

const OUTPUT_TEMPLATE: &str = "{input_image}_corrected";
const BIAS_FIELD_TEMPLATE: &str = "{input_image}_biasfield";

#[derive(Debug)]
pub struct N4BiasFieldCorrection {
    schema: Schema,
}

impl N4BiasFieldCorrection {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("n4_bias_field_correction")
            .field(
                FieldSpec::new(
                    "dimensionality",
                    FieldKind::Int,
                    "force image dimensionality (2, 3 or 4)",
                )
                .allowed(vec![2, 3, 4]),
            )
            .field(FieldSpec::new("input_image", FieldKind::File, "input image").mandatory())
            .field(FieldSpec::new("mask_image", FieldKind::File, "mask image"))
            .field(
                FieldSpec::new("rescale_intensities", FieldKind::Bool, "rescale intensities")
                    .default(true),
            )
            .field(FieldSpec::new("weight_image", FieldKind::File, "weight image"))
            .field(FieldSpec::new("shrink_factor", FieldKind::Int, "shrink factor").default(4))
            .field(
                FieldSpec::new("spline_distance", FieldKind::Float, "b-spline mesh spacing")
                    .default(200),
            )
            .field(FieldSpec::new("spline_order", FieldKind::Int, "b-spline order").default(3))
            .field(
                FieldSpec::new(
                    "num_iterations",
                    FieldKind::list(FieldKind::Int),
                    "iterations per level",
                )
                .default(vec![50, 50, 50, 50]),
            )
            .field(
                FieldSpec::new("convergence_threshold", FieldKind::Float, "convergence threshold")
                    .default(0.0),
            )
            .field(
                FieldSpec::new("bias_field_fwhm", FieldKind::Float, "bias field FWHM")
                    .default(0.15),
            )
            .field(
                FieldSpec::new("wiener_filter_noise", FieldKind::Float, "Wiener filter noise")
                    .default(0.01),
            )
            .field(
                FieldSpec::new("num_histogram_bins", FieldKind::Int, "number of histogram bins")
                    .default(200),
            )
            .field(FieldSpec::new("output_image", FieldKind::Text, "output image"))
            .field(
                FieldSpec::new("save_bias_field", FieldKind::Bool, "save bias field")
                    .default(false),
            )
            .field(FieldSpec::new("output_bias_field", FieldKind::Text, "output bias field"))
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for N4BiasFieldCorrection {
    fn name(&self) -> &'static str {
        "n4_bias_field_correction"
    }

    fn executable(&self) -> &'static str {
        "N4BiasFieldCorrection"
    }

    fn description(&self) -> &'static str {
        "N4 bias field correction"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, bound: &Bindings) -> Result<()> {
        check_positive(bound, "shrink_factor")?;
        check_positive(bound, "num_histogram_bins")?;
        if bound.get_int_list("num_iterations").map_or(true, |its| its.is_empty()) {
            return Err(TaskError::invalid_value("num_iterations", "needs at least one level"));
        }
        Ok(())
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let mut args = ArgBuilder::new();
        args.opt_if("--image-dimensionality", bound.render("dimensionality"))
            .opt("--input-image", bound.require_render("input_image")?)
            .opt_if("--mask-image", bound.render("mask_image"))
            .opt_bool("--rescale-intensities", bound.flag("rescale_intensities"))
            .opt_if("--weight-image", bound.render("weight_image"))
            .opt("--shrink-factor", bound.require_render("shrink_factor")?)
            .opt(
                "--bspline-fitting",
                bracket(&[
                    format_float(bound.require_float("spline_distance")?),
                    bound.require_render("spline_order")?,
                ]),
            )
            .opt(
                "--convergence",
                bracket(&[
                    join_x(&bound.get_int_list("num_iterations").unwrap_or_default()),
                    format_float(bound.require_float("convergence_threshold")?),
                ]),
            )
            .opt(
                "--histogram-sharpening",
                bracket(&[
                    join_floats(
                        &[
                            bound.require_float("bias_field_fwhm")?,
                            bound.require_float("wiener_filter_noise")?,
                        ],
                        ",",
                    ),
                    bound.require_render("num_histogram_bins")?,
                ]),
            );

        let output = output_name(bound, "output_image", OUTPUT_TEMPLATE)?;
        if bound.flag("save_bias_field") {
            let bias = output_name(bound, "output_bias_field", BIAS_FIELD_TEMPLATE)?;
            args.opt("--output", bracket(&[output, bias]));
        } else {
            args.opt("--output", output);
        }
        Ok(args.build())
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        let output = output_name(bound, "output_image", OUTPUT_TEMPLATE)?;
        insert_file(&mut outputs, "output_image", work_dir, &output);
        if bound.flag("save_bias_field") {
            let bias = output_name(bound, "output_bias_field", BIAS_FIELD_TEMPLATE)?;
            insert_file(&mut outputs, "output_bias_field", work_dir, &bias);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParameterSet;

    #[test]
    fn test_default_command() {
        let task = N4BiasFieldCorrection::new().unwrap();
        let cmd = task
            .command_line(&ParameterSet::new().with("input_image", "input.nii"))
            .unwrap();
        assert_eq!(
            cmd.argv(),
            vec![
                "N4BiasFieldCorrection",
                "--input-image",
                "input.nii",
                "--rescale-intensities",
                "1",
                "--shrink-factor",
                "4",
                "--bspline-fitting",
                "[200,3]",
                "--convergence",
                "[50x50x50x50,0]",
                "--histogram-sharpening",
                "[0.15,0.01,200]",
                "--output",
                "input_corrected.nii",
            ]
        );
    }

    #[test]
    fn test_bias_field_output_is_conditional() {
        let task = N4BiasFieldCorrection::new().unwrap();
        let wd = Path::new("/work");

        let params = ParameterSet::new()
            .with("input_image", "/data/subject.nii.gz")
            .with("save_bias_field", false);
        let outputs = task.outputs(&params, wd).unwrap();
        assert!(!outputs.contains_key("output_bias_field"));
        assert_eq!(
            outputs["output_image"].as_path().unwrap(),
            Path::new("/work/subject_corrected.nii.gz")
        );

        let params = params.with("save_bias_field", true);
        let outputs = task.outputs(&params, wd).unwrap();
        assert_eq!(
            outputs["output_bias_field"].as_path().unwrap(),
            Path::new("/work/subject_biasfield.nii.gz")
        );
        let argv = task.command_line(&params).unwrap().argv();
        assert_eq!(
            argv[argv.len() - 1],
            "[subject_corrected.nii.gz,subject_biasfield.nii.gz]"
        );
    }

    #[test]
    fn test_optional_images() {
        let task = N4BiasFieldCorrection::new().unwrap();
        let params = ParameterSet::new()
            .with("input_image", "t1.nii")
            .with("mask_image", "mask.nii")
            .with("dimensionality", 3)
            .with("rescale_intensities", false)
            .with("num_iterations", vec![100, 50]);
        let argv = task.command_line(&params).unwrap().argv();
        assert_eq!(&argv[1..3], &["--image-dimensionality", "3"]);
        assert!(argv.windows(2).any(|w| w == ["--mask-image", "mask.nii"]));
        assert!(argv.windows(2).any(|w| w == ["--rescale-intensities", "0"]));
        assert!(argv.windows(2).any(|w| w == ["--convergence", "[100x50,0]"]));
    }

    #[test]
    fn test_empty_iterations_rejected() {
        let task = N4BiasFieldCorrection::new().unwrap();
        let params = ParameterSet::new()
            .with("input_image", "t1.nii")
            .with("num_iterations", Vec::<i64>::new());
        assert_eq!(
            task.command_line(&params).unwrap_err(),
            TaskError::invalid_value("num_iterations", "needs at least one level")
        );
    }
}
