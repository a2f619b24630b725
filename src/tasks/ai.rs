// ai.rs - antsAI: initial affine search between two images

use std::path::Path;

use crate::core::format::{call, join_floats};
use crate::core::{
    bracket, format_float, ArgBuilder, Bindings, FieldKind, FieldSpec, Result, Schema,
    SchemaBuilder, TaskError,
};

use super::common::{insert_file, num_threads_field};
use super::traits::{OutputMap, Task};

#[derive(Debug)]
pub struct AntsAi {
    schema: Schema,
}

impl AntsAi {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("ai")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "dimension of output image")
                    .default(3)
                    .allowed(vec![2, 3]),
            )
            .field(
                FieldSpec::new(
                    "fixed_image",
                    FieldKind::File,
                    "image to which the moving image is aligned",
                )
                .mandatory(),
            )
            .field(
                FieldSpec::new("moving_image", FieldKind::File, "image that will be transformed")
                    .mandatory(),
            )
            .field(FieldSpec::new("fixed_image_mask", FieldKind::File, "fixed image mask"))
            .field(
                FieldSpec::new("moving_image_mask", FieldKind::File, "moving image mask")
                    .requires(&["fixed_image_mask"]),
            )
            .field(
                FieldSpec::new("metric", FieldKind::Text, "similarity metric")
                    .default("Mattes")
                    .allowed(vec!["Mattes", "GC", "MI"]),
            )
            .field(
                FieldSpec::new("metric_bins", FieldKind::Int, "histogram bins or radius")
                    .default(32),
            )
            .field(
                FieldSpec::new("sampling_strategy", FieldKind::Text, "metric sampling strategy")
                    .default("Regular")
                    .allowed(vec!["None", "Regular", "Random"]),
            )
            .field(
                FieldSpec::new(
                    "sampling_percentage",
                    FieldKind::Float,
                    "metric sampling percentage",
                )
                .default(0.2),
            )
            .field(
                FieldSpec::new("transform", FieldKind::Text, "transform to search")
                    .default("Affine")
                    .allowed(vec!["Rigid", "Affine", "Similarity"]),
            )
            .field(FieldSpec::new("transform_step", FieldKind::Float, "gradient step").default(0.1))
            .field(
                FieldSpec::new("principal_axes", FieldKind::Bool, "align using principal axes")
                    .default(false),
            )
            .field(FieldSpec::new(
                "blobs",
                FieldKind::list(FieldKind::Float),
                "blob count and Hessian threshold",
            ))
            .field(
                FieldSpec::new(
                    "search_factor",
                    FieldKind::list(FieldKind::Float),
                    "search step in degrees and arc fraction",
                )
                .default(vec![20.0, 0.12]),
            )
            .field(
                FieldSpec::new(
                    "search_grid_step",
                    FieldKind::Float,
                    "translation search step in mm",
                )
                .requires(&["search_grid"]),
            )
            .field(
                FieldSpec::new(
                    "search_grid",
                    FieldKind::list(FieldKind::Float),
                    "translation search extent per axis",
                )
                .requires(&["search_grid_step"]),
            )
            .field(
                FieldSpec::new("convergence_iterations", FieldKind::Int, "iterations")
                    .default(10),
            )
            .field(
                FieldSpec::new("convergence_threshold", FieldKind::Float, "convergence threshold")
                    .default(1e-6),
            )
            .field(
                FieldSpec::new("convergence_window", FieldKind::Int, "convergence window")
                    .default(10),
            )
            .field(
                FieldSpec::new("output_transform", FieldKind::Text, "output file name")
                    .default("initialization.mat"),
            )
            .field(FieldSpec::new("verbose", FieldKind::Bool, "enable verbosity").default(false))
            .field(num_threads_field())
            .xor(&["principal_axes", "blobs"])
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for AntsAi {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn executable(&self) -> &'static str {
        "antsAI"
    }

    fn description(&self) -> &'static str {
        "Search for an initial rigid/affine alignment"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, bound: &Bindings) -> Result<()> {
        let search = bound.get_float_list("search_factor").unwrap_or_default();
        if search.len() != 2 {
            return Err(TaskError::invalid_value(
                "search_factor",
                "expected [degrees, arc_fraction]",
            ));
        }
        if !(0.0..=1.0).contains(&search[1]) {
            return Err(TaskError::invalid_value(
                "search_factor",
                "arc fraction must lie in [0, 1]",
            ));
        }
        if let Some(blobs) = bound.get_list("blobs") {
            if blobs.len() != 2 {
                return Err(TaskError::invalid_value(
                    "blobs",
                    "expected [number, hessian_threshold]",
                ));
            }
        }
        if let Some(grid) = bound.get_list("search_grid") {
            let dims = bound.require_int("dimension")? as usize;
            if grid.len() != dims {
                return Err(TaskError::length_mismatch(
                    "search_grid",
                    grid.len(),
                    "dimension",
                    dims,
                ));
            }
        }
        let window = bound.require_int("convergence_window")?;
        if !(1..=100).contains(&window) {
            return Err(TaskError::invalid_value("convergence_window", "must lie in [1, 100]"));
        }
        Ok(())
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let metric = call(
            bound.require_str("metric")?,
            &[
                bound.require_render("fixed_image")?,
                bound.require_render("moving_image")?,
                bound.require_render("metric_bins")?,
                bound.require_render("sampling_strategy")?,
                format_float(bound.require_float("sampling_percentage")?),
            ],
        );
        let transform = call(
            bound.require_str("transform")?,
            &[format_float(bound.require_float("transform_step")?)],
        );

        let mut args = ArgBuilder::new();
        args.opt("-d", bound.require_render("dimension")?)
            .opt("-m", metric)
            .opt("-t", transform);

        if let Some(fixed) = bound.render("fixed_image_mask") {
            match bound.render("moving_image_mask") {
                Some(moving) => args.opt("-x", bracket(&[fixed, moving])),
                None => args.opt("-x", fixed),
            };
        }

        match bound.get_float_list("blobs") {
            Some(blobs) => match blobs.as_slice() {
                [count, threshold] => {
                    args.opt(
                        "-b",
                        bracket(&[format_float(count.trunc()), format_float(*threshold)]),
                    );
                }
                _ => {
                    return Err(TaskError::invalid_value(
                        "blobs",
                        "expected [number, hessian_threshold]",
                    ))
                }
            },
            None => {
                args.opt_bool("-p", bound.flag("principal_axes"));
            }
        }

        let search = bound.get_float_list("search_factor").unwrap_or_default();
        args.opt("-s", bracket(&[join_floats(&search, ",")]));

        if let (Some(step), Some(grid)) = (
            bound.get_float("search_grid_step"),
            bound.get_float_list("search_grid"),
        ) {
            args.opt("-g", bracket(&[format_float(step), join_floats(&grid, "x")]));
        }

        args.opt(
            "-c",
            bracket(&[
                bound.require_render("convergence_iterations")?,
                format_float(bound.require_float("convergence_threshold")?),
                bound.require_render("convergence_window")?,
            ]),
        )
        .opt("-o", bound.require_render("output_transform")?)
        .opt_bool("-v", bound.flag("verbose"));
        Ok(args.build())
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        insert_file(
            &mut outputs,
            "output_transform",
            work_dir,
            bound.require_str("output_transform")?,
        );
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParameterSet;

    fn base() -> ParameterSet {
        ParameterSet::new()
            .with("fixed_image", "structural.nii")
            .with("moving_image", "epi.nii")
    }

    #[test]
    fn test_default_command() {
        let task = AntsAi::new().unwrap();
        let argv = task.command_line(&base()).unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "antsAI",
                "-d",
                "3",
                "-m",
                "Mattes[structural.nii,epi.nii,32,Regular,0.2]",
                "-t",
                "Affine[0.1]",
                "-p",
                "0",
                "-s",
                "[20,0.12]",
                "-c",
                "[10,1e-6,10]",
                "-o",
                "initialization.mat",
                "-v",
                "0",
            ]
        );
    }

    #[test]
    fn test_masks_blobs_and_grid() {
        let task = AntsAi::new().unwrap();
        let params = base()
            .with("fixed_image_mask", "fmask.nii")
            .with("moving_image_mask", "mmask.nii")
            .with("blobs", vec![10.0, 0.9])
            .with("search_grid_step", 12)
            .with("search_grid", vec![20, 20, 40]);
        let argv = task.command_line(&params).unwrap().argv();
        assert!(argv.windows(2).any(|w| w == ["-x", "[fmask.nii,mmask.nii]"]));
        assert!(argv.windows(2).any(|w| w == ["-b", "[10,0.9]"]));
        assert!(argv.windows(2).any(|w| w == ["-g", "[12,20x20x40]"]));
        assert!(!argv.contains(&"-p".to_string()));
    }

    #[test]
    fn test_principal_axes_excludes_blobs() {
        let task = AntsAi::new().unwrap();
        let err = task
            .command_line(&base().with("principal_axes", true).with("blobs", vec![10.0, 0.9]))
            .unwrap_err();
        assert!(matches!(err, TaskError::MutuallyExclusiveViolation { .. }));

        let err = task.command_line(&base().with("search_grid", vec![1, 2])).unwrap_err();
        assert!(matches!(err, TaskError::UnmetDependency { .. }));
    }

    #[test]
    fn test_malformed_blobs_without_check() {
        let task = AntsAi::new().unwrap();
        let bound = task
            .schema()
            .validate(&base().with("blobs", Vec::<f64>::new()))
            .unwrap();
        let err = task.format_args(&bound).unwrap_err();
        assert!(matches!(err, TaskError::InvalidValue { ref field, .. } if field == "blobs"));
    }

    #[test]
    fn test_output_transform() {
        let task = AntsAi::new().unwrap();
        let outputs = task.outputs(&base(), Path::new("/w")).unwrap();
        assert_eq!(
            outputs["output_transform"].as_path().unwrap(),
            Path::new("/w/initialization.mat")
        );
    }
}
