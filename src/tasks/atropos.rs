// atropos.rs - Atropos: n-class tissue segmentation

use regex::Regex;
use std::path::Path;

use crate::core::{
    bracket, format_float, join_x, resolve_output, value::bool_token, ArgBuilder, Bindings,
    FieldKind, FieldSpec, Result, Schema, SchemaBuilder, TaskError,
};

use super::common::{insert_file, num_threads_field, output_name};
use super::traits::{OutputMap, OutputValue, Task};

const OUTPUT_TEMPLATE: &str = "{intensity_images}_labeled";

const INITIALIZATIONS: &[&str] = &[
    "Random",
    "Otsu",
    "KMeans",
    "PriorProbabilityImages",
    "PriorLabelImage",
];

/// Expand a printf-style `%d` / `%02d` index in a file name template
pub fn expand_index(template: &str, index: usize) -> String {
    match Regex::new(r"%(0?)(\d*)d") {
        Ok(re) => re
            .replace(template, |caps: &regex::Captures| {
                let width: usize = caps[2].parse().unwrap_or(0);
                if &caps[1] == "0" {
                    format!("{:0width$}", index, width = width)
                } else {
                    format!("{:width$}", index, width = width)
                }
            })
            .into_owned(),
        Err(_) => template.to_string(),
    }
}

#[derive(Debug)]
pub struct Atropos {
    schema: Schema,
}

impl Atropos {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("atropos")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "image dimension (2, 3, or 4)")
                    .default(3)
                    .allowed(vec![2, 3, 4]),
            )
            .field(
                FieldSpec::new(
                    "intensity_images",
                    FieldKind::list(FieldKind::File),
                    "intensity images",
                )
                .mandatory(),
            )
            .field(FieldSpec::new("mask_image", FieldKind::File, "mask image").mandatory())
            .field(
                FieldSpec::new("initialization", FieldKind::Text, "initialization method")
                    .mandatory()
                    .allowed(INITIALIZATIONS.to_vec())
                    .requires(&["number_of_tissue_classes"]),
            )
            .field(FieldSpec::new(
                "kmeans_init_centers",
                FieldKind::list(FieldKind::Float),
                "initial KMeans centres",
            ))
            .field(FieldSpec::new(
                "prior_image",
                FieldKind::Text,
                "prior file pattern (e.g. 'prior%02d.nii') or vector image",
            ))
            .field(
                FieldSpec::new("number_of_tissue_classes", FieldKind::Int, "number of classes")
                    .mandatory(),
            )
            .field(FieldSpec::new("prior_weighting", FieldKind::Float, "weight of the priors"))
            .field(
                FieldSpec::new(
                    "prior_probability_threshold",
                    FieldKind::Float,
                    "sparse prior threshold",
                )
                .requires(&["prior_weighting"]),
            )
            .field(
                FieldSpec::new("likelihood_model", FieldKind::Text, "likelihood model")
                    .allowed(vec![
                        "Gaussian",
                        "HistogramParzenWindows",
                        "ManifoldParzenWindows",
                        "LogEuclideanGaussian",
                    ]),
            )
            .field(FieldSpec::new("mrf_smoothing_factor", FieldKind::Float, "MRF smoothing factor"))
            .field(
                FieldSpec::new(
                    "mrf_radius",
                    FieldKind::list(FieldKind::Int),
                    "MRF neighbourhood radius",
                )
                .requires(&["mrf_smoothing_factor"]),
            )
            .field(FieldSpec::new(
                "icm_use_synchronous_update",
                FieldKind::Bool,
                "synchronous ICM update",
            ))
            .field(
                FieldSpec::new(
                    "maximum_number_of_icm_terations",
                    FieldKind::Int,
                    "maximum ICM iterations",
                )
                .requires(&["icm_use_synchronous_update"]),
            )
            .field(FieldSpec::new("n_iterations", FieldKind::Int, "maximum number of iterations"))
            .field(
                FieldSpec::new("convergence_threshold", FieldKind::Float, "convergence threshold")
                    .requires(&["n_iterations"]),
            )
            .field(
                FieldSpec::new("posterior_formulation", FieldKind::Text, "posterior formulation")
                    .allowed(vec!["Socrates", "Plato", "Aristotle", "Sigmoid"]),
            )
            .field(FieldSpec::new(
                "use_random_seed",
                FieldKind::Bool,
                "use random seed value over constant",
            ))
            .field(
                FieldSpec::new(
                    "use_mixture_model_proportions",
                    FieldKind::Bool,
                    "use mixture model proportions",
                )
                .requires(&["posterior_formulation"]),
            )
            .field(FieldSpec::new(
                "out_classified_image_name",
                FieldKind::Text,
                "classified image name",
            ))
            .field(
                FieldSpec::new(
                    "save_posteriors",
                    FieldKind::Bool,
                    "write one posterior image per class",
                )
                .default(false),
            )
            .field(
                FieldSpec::new(
                    "output_posteriors_name_template",
                    FieldKind::Text,
                    "posterior file name template",
                )
                .default("POSTERIOR_%02d.nii.gz"),
            )
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }

    /// KMeans centres in ascending order, duplicates removed
    fn kmeans_centers(bound: &Bindings) -> Option<Vec<f64>> {
        let mut centers = bound.get_float_list("kmeans_init_centers")?;
        centers.sort_by(|a, b| a.total_cmp(b));
        centers.dedup();
        Some(centers)
    }

    fn initialization_token(bound: &Bindings) -> Result<String> {
        let method = bound.require_str("initialization")?;
        let classes = bound.require_int("number_of_tissue_classes")?;
        let mut params = vec![classes.to_string()];

        if method == "KMeans" {
            if let Some(centers) = Self::kmeans_centers(bound) {
                let centers: Vec<String> = centers.into_iter().map(format_float).collect();
                params.push(bracket(&centers));
            }
        } else if method.starts_with("Prior") {
            params.push(bound.require_render("prior_image")?);
            params.push(format_float(bound.require_float("prior_weighting")?));
            if let Some(threshold) = bound.get_float("prior_probability_threshold") {
                params.push(format_float(threshold));
            }
        }
        Ok(format!("{}{}", method, bracket(&params)))
    }
}

impl Task for Atropos {
    fn name(&self) -> &'static str {
        "atropos"
    }

    fn executable(&self) -> &'static str {
        "Atropos"
    }

    fn description(&self) -> &'static str {
        "Tissue segmentation by expectation maximisation with MRF priors"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, bound: &Bindings) -> Result<()> {
        let classes = bound.require_int("number_of_tissue_classes")?;
        if classes < 1 {
            return Err(TaskError::invalid_value(
                "number_of_tissue_classes",
                format!("must be at least 1, got {}", classes),
            ));
        }

        let method = bound.require_str("initialization")?;
        if method == "KMeans" {
            if let Some(centers) = Self::kmeans_centers(bound) {
                if centers.len() as i64 != classes {
                    return Err(TaskError::length_mismatch(
                        "kmeans_init_centers",
                        centers.len(),
                        "number_of_tissue_classes",
                        classes as usize,
                    ));
                }
            }
        }
        if method.starts_with("Prior") {
            for field in ["prior_image", "prior_weighting"] {
                if !bound.is_set(field) {
                    return Err(TaskError::UnmetDependency {
                        field: "initialization".to_string(),
                        requires: field.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let mut args = ArgBuilder::new();
        args.opt("--image-dimensionality", bound.require_render("dimension")?);
        for image in bound.get_str_list("intensity_images").unwrap_or_default() {
            args.opt("--intensity-image", image);
        }
        args.opt("--mask-image", bound.require_render("mask_image")?)
            .opt("--initialization", Self::initialization_token(bound)?)
            .opt_if("--likelihood-model", bound.render("likelihood_model"));

        if let Some(factor) = bound.get_float("mrf_smoothing_factor") {
            let mut mrf = vec![format_float(factor)];
            if let Some(radius) = bound.get_int_list("mrf_radius") {
                mrf.push(join_x(&radius));
            }
            args.opt("--mrf", bracket(&mrf));
        }

        if let Some(sync) = bound.get_bool("icm_use_synchronous_update") {
            let mut icm = vec![bool_token(sync).to_string()];
            if let Some(max) = bound.get_int("maximum_number_of_icm_terations") {
                icm.push(max.to_string());
            }
            args.opt("--icm", bracket(&icm));
        }

        if let Some(n) = bound.get_int("n_iterations") {
            let mut convergence = vec![n.to_string()];
            if let Some(threshold) = bound.get_float("convergence_threshold") {
                convergence.push(format_float(threshold));
            }
            args.opt("--convergence", bracket(&convergence));
        }

        if let Some(formulation) = bound.get_str("posterior_formulation") {
            let token = match bound.get_bool("use_mixture_model_proportions") {
                Some(mix) => format!("{}[{}]", formulation, bool_token(mix)),
                None => formulation.to_string(),
            };
            args.opt("--posterior-formulation", token);
        }

        args.opt_bool_if("--use-random-seed", bound.get_bool("use_random_seed"));

        let mut output = vec![output_name(bound, "out_classified_image_name", OUTPUT_TEMPLATE)?];
        if bound.flag("save_posteriors") {
            output.push(bound.require_render("output_posteriors_name_template")?);
        }
        args.opt("--output", bracket(&output));
        Ok(args.build())
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        let classified = output_name(bound, "out_classified_image_name", OUTPUT_TEMPLATE)?;
        insert_file(&mut outputs, "classified_image", work_dir, &classified);

        if bound.flag("save_posteriors") {
            let template = bound.require_str("output_posteriors_name_template")?;
            let classes = bound.require_int("number_of_tissue_classes")? as usize;
            let posteriors = (1..=classes)
                .map(|i| resolve_output(work_dir, &expand_index(template, i)))
                .collect();
            outputs.insert("posteriors".to_string(), OutputValue::Files(posteriors));
        }
        Ok(outputs)
    }
}
