// registration.rs - antsRegistration: explicit multi-stage registration and shared plan

use std::path::Path;

use crate::core::format::call;
use crate::core::{
    bracket, compose_stages, format_float, resolve_output, transform_file_name,
    value::bool_token, ArgBuilder, Bindings, Convergence, FieldKind, FieldSpec, Metric,
    MetricKind, Result, Schema, SchemaBuilder, SigmaUnits, Stage, TaskError, Transform,
    TransformKind,
};
use crate::core::stage::LevelFields;

use super::common::{insert_file, num_threads_field, INTERPOLATIONS};
use super::traits::{OutputMap, OutputValue, Task};

/// How the moving image is placed before the first stage
#[derive(Debug, Clone, PartialEq)]
pub enum InitialTransform {
    None,
    /// Existing transform files with their invert flags
    Files(Vec<(String, bool)>),
    /// Derived from the image pair: 0 geometric centre, 1 centre of mass, 2 origin
    CenterOfMass { fixed: String, moving: String, mode: i64 },
}

impl InitialTransform {
    fn tokens(&self) -> Vec<String> {
        match self {
            InitialTransform::None => Vec::new(),
            InitialTransform::Files(files) => files
                .iter()
                .flat_map(|(file, invert)| {
                    [
                        "--initial-moving-transform".to_string(),
                        bracket(&[file.as_str(), bool_token(*invert)]),
                    ]
                })
                .collect(),
            InitialTransform::CenterOfMass { fixed, moving, mode } => vec![
                "--initial-moving-transform".to_string(),
                bracket(&[fixed.clone(), moving.clone(), mode.to_string()]),
            ],
        }
    }
}

/// Global antsRegistration options surrounding the stage list
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOptions {
    pub dimension: i64,
    pub float: Option<bool>,
    pub restore_state: Option<String>,
    pub save_state: Option<String>,
    pub prefix: String,
    pub warped_image: Option<String>,
    pub inverse_warped_image: Option<String>,
    pub interpolation: String,
    pub winsorize: Option<(f64, f64)>,
    pub initial: InitialTransform,
    pub initialize_per_stage: bool,
    pub collapse: bool,
    pub histogram_matching: bool,
    pub masks: Option<(String, String)>,
    pub write_composite: bool,
    pub random_seed: Option<i64>,
    pub verbose: bool,
}

/// A fully resolved antsRegistration invocation: options plus ordered stages
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationPlan {
    pub options: RegistrationOptions,
    pub stages: Vec<Stage>,
}

impl RegistrationPlan {
    pub fn validate(&self) -> Result<()> {
        for stage in self.stages.iter().filter(|s| s.enabled) {
            stage.check_levels()?;
        }
        if !self.stages.iter().any(|s| s.enabled) {
            return Err(TaskError::invalid_value("transforms", "no enabled registration stage"));
        }
        Ok(())
    }

    pub fn args(&self) -> Result<Vec<String>> {
        let stage_args = compose_stages(&self.stages)?;
        let o = &self.options;

        let mut args = ArgBuilder::new();
        args.opt("--dimensionality", o.dimension.to_string())
            .opt_bool_if("--float", o.float)
            .opt_if("--restore-state", o.restore_state.clone())
            .opt_if("--save-state", o.save_state.clone());

        match (&o.warped_image, &o.inverse_warped_image) {
            (Some(warped), Some(inverse)) => {
                args.opt("--output", bracket(&[&o.prefix, warped, inverse]))
            }
            (Some(warped), None) => args.opt("--output", bracket(&[&o.prefix, warped])),
            _ => args.opt("--output", o.prefix.clone()),
        };

        args.opt("--interpolation", o.interpolation.clone());
        if let Some((lower, upper)) = o.winsorize {
            args.opt(
                "--winsorize-image-intensities",
                bracket(&[format_float(lower), format_float(upper)]),
            );
        }
        args.extend(o.initial.tokens())
            .opt_bool("--initialize-transforms-per-stage", o.initialize_per_stage)
            .opt_bool("--collapse-output-transforms", o.collapse)
            .opt_bool("--use-histogram-matching", o.histogram_matching);
        if let Some((fixed, moving)) = &o.masks {
            args.opt("--masks", bracket(&[fixed, moving]));
        }
        args.extend(stage_args)
            .opt_bool("--write-composite-transform", o.write_composite)
            .opt_if("--random-seed", o.random_seed.map(|s| s.to_string()));
        if o.verbose {
            args.opt("--verbose", "1");
        }
        Ok(args.build())
    }

    /// Transform files in the order and with the names antsRegistration writes them
    pub fn outputs(&self, work_dir: &Path) -> OutputMap {
        let o = &self.options;
        let resolve = |name: &str| resolve_output(work_dir, name);
        let mut outputs = OutputMap::new();

        if o.write_composite {
            insert_file(
                &mut outputs,
                "composite_transform",
                work_dir,
                &format!("{}Composite.h5", o.prefix),
            );
            insert_file(
                &mut outputs,
                "inverse_composite_transform",
                work_dir,
                &format!("{}InverseComposite.h5", o.prefix),
            );
        } else {
            let kinds: Vec<TransformKind> = self
                .stages
                .iter()
                .filter(|s| s.enabled)
                .map(|s| s.transform.kind)
                .collect();

            let mut forward = Vec::new();
            let mut forward_flags = Vec::new();
            let mut reverse = Vec::new();
            let mut reverse_flags = Vec::new();

            if !o.collapse {
                let mut count = 0;
                match &o.initial {
                    InitialTransform::Files(files) => {
                        for (file, invert) in files {
                            forward.push(resolve(file));
                            forward_flags.push(*invert);
                        }
                        for (file, invert) in files.iter().rev() {
                            reverse.insert(0, resolve(file));
                            reverse_flags.insert(0, !*invert);
                        }
                        count += files.len();
                    }
                    InitialTransform::CenterOfMass { .. } => {
                        let (name, _) = transform_file_name(&o.prefix, count, "Initial", false);
                        forward.push(resolve(&name));
                        forward_flags.push(false);
                        let (name, _) = transform_file_name(&o.prefix, count, "Initial", true);
                        reverse.insert(0, resolve(&name));
                        reverse_flags.insert(0, true);
                        count += 1;
                    }
                    InitialTransform::None => {}
                }
                for kind in &kinds {
                    let (name, invert) = transform_file_name(&o.prefix, count, kind.name(), false);
                    forward.push(resolve(&name));
                    forward_flags.push(invert);
                    let (name, invert) = transform_file_name(&o.prefix, count, kind.name(), true);
                    reverse.insert(0, resolve(&name));
                    reverse_flags.insert(0, invert);
                    count += 1;
                }
            } else {
                let mut linear: Vec<bool> = kinds.iter().map(TransformKind::is_linear).collect();
                if o.initial != InitialTransform::None {
                    linear.insert(0, true);
                }
                let mut collapsed = Vec::new();
                if linear.iter().any(|l| *l) {
                    collapsed.push("GenericAffine");
                }
                if !linear.iter().all(|l| *l) {
                    collapsed.push("SyN");
                }
                for (count, kind) in collapsed.into_iter().enumerate() {
                    let (name, invert) = transform_file_name(&o.prefix, count, kind, false);
                    forward.push(resolve(&name));
                    forward_flags.push(invert);
                    let (name, invert) = transform_file_name(&o.prefix, count, kind, true);
                    reverse.push(resolve(&name));
                    reverse_flags.push(invert);
                }
            }

            let reverse_forward: Vec<_> = forward.iter().rev().cloned().collect();
            let reverse_forward_flags: Vec<_> = forward_flags.iter().rev().copied().collect();
            outputs.insert("forward_transforms".to_string(), OutputValue::Files(forward));
            outputs.insert("forward_invert_flags".to_string(), OutputValue::Flags(forward_flags));
            outputs.insert("reverse_transforms".to_string(), OutputValue::Files(reverse));
            outputs.insert("reverse_invert_flags".to_string(), OutputValue::Flags(reverse_flags));
            outputs.insert(
                "reverse_forward_transforms".to_string(),
                OutputValue::Files(reverse_forward),
            );
            outputs.insert(
                "reverse_forward_invert_flags".to_string(),
                OutputValue::Flags(reverse_forward_flags),
            );
        }

        if let Some(warped) = &o.warped_image {
            insert_file(&mut outputs, "warped_image", work_dir, warped);
        }
        if let Some(inverse) = &o.inverse_warped_image {
            insert_file(&mut outputs, "inverse_warped_image", work_dir, inverse);
        }
        if let Some(state) = &o.save_state {
            insert_file(&mut outputs, "save_state", work_dir, state);
        }
        outputs
    }
}

/// Winsorize quantiles when either bound was given explicitly
pub fn winsorize_option(bound: &Bindings) -> Result<Option<(f64, f64)>> {
    if !bound.is_explicit("winsorize_lower_quantile")
        && !bound.is_explicit("winsorize_upper_quantile")
    {
        return Ok(None);
    }
    let lower = bound.require_float("winsorize_lower_quantile")?;
    let upper = bound.require_float("winsorize_upper_quantile")?;
    if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
        return Err(TaskError::invalid_value(
            "winsorize_lower_quantile",
            format!("quantiles must satisfy 0 <= lower < upper <= 1, got [{}, {}]", lower, upper),
        ));
    }
    Ok(Some((lower, upper)))
}

/// Per-stage list fields checked against the number of transforms
const STAGE_LISTS: &[&str] = &[
    "transform_parameters",
    "metric",
    "metric_weight",
    "radius_or_number_of_bins",
    "sampling_strategy",
    "sampling_percentage",
    "number_of_iterations",
    "convergence_threshold",
    "convergence_window_size",
    "shrink_factors",
    "smoothing_sigmas",
    "sigma_units",
    "restrict_deformation",
    "fixed_image_masks",
    "moving_image_masks",
];

#[derive(Debug)]
pub struct Registration {
    schema: Schema,
}

impl Registration {
    pub fn new() -> Result<Self> {
        let nested_int = || FieldKind::list(FieldKind::list(FieldKind::Int));
        let nested_float = || FieldKind::list(FieldKind::list(FieldKind::Float));

        let schema = SchemaBuilder::new("registration")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "image dimension (2 or 3)")
                    .default(3)
                    .allowed(vec![2, 3]),
            )
            .field(
                FieldSpec::new(
                    "fixed_image",
                    FieldKind::File,
                    "image to which the moving image is warped",
                )
                .mandatory(),
            )
            .field(
                FieldSpec::new(
                    "moving_image",
                    FieldKind::File,
                    "image to apply the transformation to",
                )
                .mandatory(),
            )
            .field(FieldSpec::new(
                "fixed_image_mask",
                FieldKind::File,
                "mask used to limit metric sampling region of the fixed image in all stages",
            ))
            .field(FieldSpec::new(
                "fixed_image_masks",
                FieldKind::list(FieldKind::Text),
                "per-stage fixed masks, 'NULL' for none",
            ))
            .field(
                FieldSpec::new(
                    "moving_image_mask",
                    FieldKind::File,
                    "mask used to limit metric sampling region of the moving image in all stages",
                )
                .requires(&["fixed_image_mask"]),
            )
            .field(FieldSpec::new(
                "moving_image_masks",
                FieldKind::list(FieldKind::Text),
                "per-stage moving masks, 'NULL' for none",
            ))
            .field(FieldSpec::new(
                "save_state",
                FieldKind::Text,
                "filename for saving the internal restorable state",
            ))
            .field(FieldSpec::new(
                "restore_state",
                FieldKind::File,
                "filename for restoring the internal restorable state",
            ))
            .field(FieldSpec::new(
                "initial_moving_transform",
                FieldKind::list(FieldKind::File),
                "transforms applied before the first stage",
            ))
            .field(
                FieldSpec::new(
                    "invert_initial_moving_transform",
                    FieldKind::list(FieldKind::Bool),
                    "invert flags of the initial transforms",
                )
                .requires(&["initial_moving_transform"]),
            )
            .field(
                FieldSpec::new(
                    "initial_moving_transform_com",
                    FieldKind::Int,
                    "align the images by geometric centre (0), centre of mass (1) or origin (2)",
                )
                .allowed(vec![0, 1, 2]),
            )
            .field(
                FieldSpec::new(
                    "transforms",
                    FieldKind::list(FieldKind::Text),
                    "transform of each stage",
                )
                .mandatory()
                .allowed(TransformKind::names()),
            )
            .field(FieldSpec::new(
                "transform_parameters",
                nested_float(),
                "gradient step and model parameters of each stage",
            ))
            .field(
                FieldSpec::new(
                    "metric",
                    FieldKind::list(FieldKind::Text),
                    "similarity metric of each stage",
                )
                .mandatory()
                .allowed(MetricKind::NAMES.to_vec()),
            )
            .field(
                FieldSpec::new(
                    "metric_weight",
                    FieldKind::list(FieldKind::Float),
                    "metric weight of each stage",
                )
                .requires(&["metric"]),
            )
            .field(
                FieldSpec::new(
                    "radius_or_number_of_bins",
                    FieldKind::list(FieldKind::Int),
                    "CC radius or histogram bins of each stage",
                )
                .requires(&["metric_weight"]),
            )
            .field(
                FieldSpec::new(
                    "sampling_strategy",
                    FieldKind::list(FieldKind::Text),
                    "metric sampling strategy of each stage",
                )
                .allowed(vec!["None", "Regular", "Random"])
                .requires(&["metric_weight"]),
            )
            .field(
                FieldSpec::new(
                    "sampling_percentage",
                    FieldKind::list(FieldKind::Float),
                    "metric sampling percentage of each stage",
                )
                .requires(&["sampling_strategy"]),
            )
            .field(
                FieldSpec::new(
                    "use_histogram_matching",
                    FieldKind::Bool,
                    "histogram match the images before registration",
                )
                .default(true),
            )
            .field(
                FieldSpec::new(
                    "interpolation",
                    FieldKind::Text,
                    "interpolation of the warped output",
                )
                .default("Linear")
                .allowed(INTERPOLATIONS.to_vec()),
            )
            .field(FieldSpec::new(
                "interpolation_parameters",
                FieldKind::list(FieldKind::Float),
                "interpolator parameters",
            ))
            .field(
                FieldSpec::new(
                    "write_composite_transform",
                    FieldKind::Bool,
                    "write a single composite transform file",
                )
                .default(false),
            )
            .field(
                FieldSpec::new(
                    "collapse_output_transforms",
                    FieldKind::Bool,
                    "collapse output transforms",
                )
                .default(true),
            )
            .field(
                FieldSpec::new(
                    "initialize_transforms_per_stage",
                    FieldKind::Bool,
                    "initialise each stage with the previous one",
                )
                .default(false),
            )
            .field(FieldSpec::new(
                "float",
                FieldKind::Bool,
                "use float instead of double precision",
            ))
            .field(
                FieldSpec::new(
                    "number_of_iterations",
                    nested_int(),
                    "iterations per level of each stage",
                )
                .mandatory(),
            )
            .field(
                FieldSpec::new(
                    "convergence_threshold",
                    FieldKind::list(FieldKind::Float),
                    "convergence threshold of each stage",
                )
                .requires(&["number_of_iterations"]),
            )
            .field(
                FieldSpec::new(
                    "convergence_window_size",
                    FieldKind::list(FieldKind::Int),
                    "convergence window of each stage",
                )
                .requires(&["convergence_threshold"]),
            )
            .field(
                FieldSpec::new(
                    "shrink_factors",
                    nested_int(),
                    "shrink factor per level of each stage",
                )
                .mandatory(),
            )
            .field(
                FieldSpec::new(
                    "smoothing_sigmas",
                    nested_float(),
                    "smoothing sigma per level of each stage",
                )
                .mandatory(),
            )
            .field(
                FieldSpec::new(
                    "sigma_units",
                    FieldKind::list(FieldKind::Text),
                    "units of the smoothing sigmas of each stage",
                )
                .allowed(vec!["vox", "mm"])
                .requires(&["smoothing_sigmas"]),
            )
            .field(FieldSpec::new(
                "restrict_deformation",
                nested_float(),
                "per-axis deformation weights of each stage",
            ))
            .field(
                FieldSpec::new(
                    "output_transform_prefix",
                    FieldKind::Text,
                    "prefix of the output transforms",
                )
                .default("transform"),
            )
            .field(FieldSpec::new(
                "output_warped_image",
                FieldKind::Flag,
                "write the warped moving image (true or file name)",
            ))
            .field(
                FieldSpec::new(
                    "output_inverse_warped_image",
                    FieldKind::Flag,
                    "write the warped fixed image (true or file name)",
                )
                .requires(&["output_warped_image"]),
            )
            .field(
                FieldSpec::new(
                    "winsorize_upper_quantile",
                    FieldKind::Float,
                    "upper winsorize quantile",
                )
                .default(1.0),
            )
            .field(
                FieldSpec::new(
                    "winsorize_lower_quantile",
                    FieldKind::Float,
                    "lower winsorize quantile",
                )
                .default(0.0),
            )
            .field(FieldSpec::new(
                "random_seed",
                FieldKind::Int,
                "fixed seed for random number generation",
            ))
            .field(FieldSpec::new("verbose", FieldKind::Bool, "verbose output").default(false))
            .field(num_threads_field())
            .xor(&["fixed_image_mask", "fixed_image_masks"])
            .xor(&["moving_image_mask", "moving_image_masks"])
            .xor(&["initial_moving_transform", "initial_moving_transform_com"])
            .xor(&["invert_initial_moving_transform", "initial_moving_transform_com"])
            .build()?;
        Ok(Self { schema })
    }

    fn stage(bound: &Bindings, index: usize) -> Result<Stage> {
        let pick_str = |field: &str| -> Option<String> {
            bound.get_str_list(field).and_then(|v| v.get(index).cloned())
        };
        let pick_float =
            |field: &str| bound.get_float_list(field).and_then(|v| v.get(index).copied());
        let pick_int = |field: &str| bound.get_int_list(field).and_then(|v| v.get(index).copied());

        let kind: TransformKind = pick_str("transforms")
            .ok_or_else(|| TaskError::missing("transforms"))?
            .parse()?;
        let params = bound
            .get_nested_float_list("transform_parameters")
            .and_then(|v| v.get(index).cloned())
            .unwrap_or_default();

        let metric_kind: MetricKind = pick_str("metric")
            .ok_or_else(|| TaskError::missing("metric"))?
            .parse()?;
        let mut metric = Metric::new(
            metric_kind,
            bound.require_str("fixed_image")?,
            bound.require_str("moving_image")?,
            pick_float("metric_weight").unwrap_or(1.0),
            pick_int("radius_or_number_of_bins").unwrap_or(5),
        );
        if let Some(strategy) = pick_str("sampling_strategy") {
            metric = metric.with_sampling(&strategy, pick_float("sampling_percentage"));
        }

        let iterations = bound
            .get_nested_int_list("number_of_iterations")
            .and_then(|v| v.get(index).cloned())
            .ok_or_else(|| TaskError::missing("number_of_iterations"))?;
        let shrink_factors = bound
            .get_nested_int_list("shrink_factors")
            .and_then(|v| v.get(index).cloned())
            .ok_or_else(|| TaskError::missing("shrink_factors"))?;
        let smoothing_sigmas = bound
            .get_nested_float_list("smoothing_sigmas")
            .and_then(|v| v.get(index).cloned())
            .ok_or_else(|| TaskError::missing("smoothing_sigmas"))?;
        let sigma_units = match pick_str("sigma_units") {
            Some(units) => units.parse()?,
            None => SigmaUnits::Vox,
        };

        let masks = if bound.is_set("fixed_image_masks") || bound.is_set("moving_image_masks") {
            Some((
                pick_str("fixed_image_masks").unwrap_or_else(|| "NULL".to_string()),
                pick_str("moving_image_masks").unwrap_or_else(|| "NULL".to_string()),
            ))
        } else {
            None
        };

        Ok(Stage {
            label: format!("stage {} ({})", index, kind),
            enabled: true,
            transform: Transform::new(kind, params),
            metrics: vec![metric],
            convergence: Convergence {
                iterations,
                threshold: pick_float("convergence_threshold").unwrap_or(1e-6),
                window: pick_int("convergence_window_size").unwrap_or(10),
            },
            shrink_factors,
            smoothing_sigmas,
            sigma_units,
            restrict_deformation: bound
                .get_nested_float_list("restrict_deformation")
                .and_then(|v| v.get(index).cloned()),
            masks,
            fields: LevelFields::indexed(index),
        })
    }

    fn interpolation(bound: &Bindings) -> Result<String> {
        let method = bound.require_str("interpolation")?;
        let params: Vec<String> = match (method, bound.get_float_list("interpolation_parameters")) {
            ("BSpline" | "MultiLabel" | "Gaussian" | "GenericLabel", Some(params)) => {
                params.into_iter().map(format_float).collect()
            }
            _ => Vec::new(),
        };
        Ok(call(method, &params))
    }

    /// Resolve the bindings into a complete registration plan
    pub fn plan(&self, bound: &Bindings) -> Result<RegistrationPlan> {
        let count = bound.get_list("transforms").map(|t| t.len()).unwrap_or(0);
        for field in STAGE_LISTS {
            if let Some(items) = bound.get_list(field) {
                if items.len() != count {
                    return Err(TaskError::length_mismatch(field, items.len(), "transforms", count));
                }
            }
        }

        let stages = (0..count)
            .map(|i| Self::stage(bound, i))
            .collect::<Result<Vec<_>>>()?;

        let initial = if let Some(files) = bound.get_str_list("initial_moving_transform") {
            let flags = bound
                .get_bool_list("invert_initial_moving_transform")
                .unwrap_or_else(|| vec![false; files.len()]);
            if flags.len() != files.len() {
                return Err(TaskError::length_mismatch(
                    "invert_initial_moving_transform",
                    flags.len(),
                    "initial_moving_transform",
                    files.len(),
                ));
            }
            InitialTransform::Files(files.into_iter().zip(flags).collect())
        } else if let Some(mode) = bound.get_int("initial_moving_transform_com") {
            InitialTransform::CenterOfMass {
                fixed: bound.require_render("fixed_image")?,
                moving: bound.require_render("moving_image")?,
                mode,
            }
        } else {
            InitialTransform::None
        };

        let prefix = bound.require_str("output_transform_prefix")?.to_string();
        let warped_name = |field: &str, suffix: &str| -> Option<String> {
            match bound.get(field) {
                Some(v) if v.as_bool() == Some(true) => {
                    Some(format!("{}_{}.nii.gz", prefix, suffix))
                }
                Some(v) => v.as_str().map(str::to_string),
                None => None,
            }
        };
        let warped_image = warped_name("output_warped_image", "Warped");
        let inverse_warped_image = warped_image
            .as_ref()
            .and_then(|_| warped_name("output_inverse_warped_image", "InverseWarped"));

        let masks = bound.render("fixed_image_mask").map(|fixed| {
            (fixed, bound.render("moving_image_mask").unwrap_or_else(|| "NULL".to_string()))
        });

        let plan = RegistrationPlan {
            options: RegistrationOptions {
                dimension: bound.require_int("dimension")?,
                float: bound.get_bool("float"),
                restore_state: bound.render("restore_state"),
                save_state: bound.render("save_state"),
                prefix,
                warped_image,
                inverse_warped_image,
                interpolation: Self::interpolation(bound)?,
                winsorize: winsorize_option(bound)?,
                initial,
                initialize_per_stage: bound.flag("initialize_transforms_per_stage"),
                collapse: bound.flag("collapse_output_transforms"),
                histogram_matching: bound.flag("use_histogram_matching"),
                masks,
                write_composite: bound.flag("write_composite_transform"),
                random_seed: bound.get_int("random_seed"),
                verbose: bound.flag("verbose"),
            },
            stages,
        };
        plan.validate()?;
        Ok(plan)
    }
}

impl Task for Registration {
    fn name(&self) -> &'static str {
        "registration"
    }

    fn executable(&self) -> &'static str {
        "antsRegistration"
    }

    fn description(&self) -> &'static str {
        "Multi-stage image registration from per-stage parameter lists"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, bound: &Bindings) -> Result<()> {
        self.plan(bound).map(|_| ())
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        self.plan(bound)?.args()
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        Ok(self.plan(bound)?.outputs(work_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParameterSet, Value};
    use std::path::PathBuf;

    fn two_stage() -> ParameterSet {
        ParameterSet::new()
            .with("fixed_image", "fixed1.nii")
            .with("moving_image", "moving1.nii")
            .with("output_transform_prefix", "output_")
            .with("initial_moving_transform", vec!["trans.mat"])
            .with("invert_initial_moving_transform", vec![false])
            .with("transforms", vec!["Affine", "SyN"])
            .with(
                "transform_parameters",
                Value::List(vec![Value::from(vec![2.0]), Value::from(vec![0.25, 3.0, 0.0])]),
            )
            .with(
                "number_of_iterations",
                Value::List(vec![Value::from(vec![1500, 200]), Value::from(vec![100, 50, 30])]),
            )
            .with("metric", vec!["Mattes", "Mattes"])
            .with("metric_weight", vec![1, 1])
            .with("radius_or_number_of_bins", vec![32, 32])
            .with("sampling_strategy", vec!["Random", "Random"])
            .with("sampling_percentage", vec![0.05, 0.05])
            .with("convergence_threshold", vec![1e-8, 1e-9])
            .with("convergence_window_size", vec![20, 20])
            .with(
                "smoothing_sigmas",
                Value::List(vec![Value::from(vec![1, 0]), Value::from(vec![2, 1, 0])]),
            )
            .with("sigma_units", vec!["vox", "vox"])
            .with(
                "shrink_factors",
                Value::List(vec![Value::from(vec![2, 1]), Value::from(vec![3, 2, 1])]),
            )
            .with("use_histogram_matching", true)
            .with("output_warped_image", "output_warped_image.nii.gz")
            .with("winsorize_lower_quantile", 0.025)
            .with("winsorize_upper_quantile", 0.975)
    }

    #[test]
    fn test_two_stage_command() {
        let task = Registration::new().unwrap();
        let argv = task.command_line(&two_stage()).unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "antsRegistration",
                "--dimensionality",
                "3",
                "--output",
                "[output_,output_warped_image.nii.gz]",
                "--interpolation",
                "Linear",
                "--winsorize-image-intensities",
                "[0.025,0.975]",
                "--initial-moving-transform",
                "[trans.mat,0]",
                "--initialize-transforms-per-stage",
                "0",
                "--collapse-output-transforms",
                "1",
                "--use-histogram-matching",
                "1",
                "--transform",
                "Affine[2]",
                "--metric",
                "Mattes[fixed1.nii,moving1.nii,1,32,Random,0.05]",
                "--convergence",
                "[1500x200,1e-8,20]",
                "--shrink-factors",
                "2x1",
                "--smoothing-sigmas",
                "1x0vox",
                "--transform",
                "SyN[0.25,3,0]",
                "--metric",
                "Mattes[fixed1.nii,moving1.nii,1,32,Random,0.05]",
                "--convergence",
                "[100x50x30,1e-9,20]",
                "--shrink-factors",
                "3x2x1",
                "--smoothing-sigmas",
                "2x1x0vox",
                "--write-composite-transform",
                "0",
            ]
        );
    }

    #[test]
    fn test_collapsed_outputs() {
        let task = Registration::new().unwrap();
        let outputs = task.outputs(&two_stage(), Path::new("/w")).unwrap();
        assert_eq!(
            outputs["forward_transforms"].as_paths().unwrap(),
            &[
                PathBuf::from("/w/output_0GenericAffine.mat"),
                PathBuf::from("/w/output_1Warp.nii.gz"),
            ]
        );
        assert_eq!(outputs["forward_invert_flags"].as_flags().unwrap(), &[false, false]);
        assert_eq!(
            outputs["reverse_transforms"].as_paths().unwrap(),
            &[
                PathBuf::from("/w/output_0GenericAffine.mat"),
                PathBuf::from("/w/output_1InverseWarp.nii.gz"),
            ]
        );
        assert_eq!(outputs["reverse_invert_flags"].as_flags().unwrap(), &[true, false]);
        assert_eq!(
            outputs["reverse_forward_transforms"].as_paths().unwrap(),
            &[
                PathBuf::from("/w/output_1Warp.nii.gz"),
                PathBuf::from("/w/output_0GenericAffine.mat"),
            ]
        );
        assert_eq!(
            outputs["warped_image"].as_path().unwrap(),
            Path::new("/w/output_warped_image.nii.gz")
        );
        assert!(!outputs.contains_key("inverse_warped_image"));
        assert!(!outputs.contains_key("composite_transform"));
    }

    #[test]
    fn test_uncollapsed_outputs_are_ordinal() {
        let task = Registration::new().unwrap();
        let params = two_stage().with("collapse_output_transforms", false);
        let outputs = task.outputs(&params, Path::new("/w")).unwrap();
        assert_eq!(
            outputs["forward_transforms"].as_paths().unwrap(),
            &[
                PathBuf::from("/w/trans.mat"),
                PathBuf::from("/w/output_1Affine.mat"),
                PathBuf::from("/w/output_2Warp.nii.gz"),
            ]
        );
        assert_eq!(outputs["forward_invert_flags"].as_flags().unwrap(), &[false, false, false]);
        assert_eq!(
            outputs["reverse_transforms"].as_paths().unwrap(),
            &[
                PathBuf::from("/w/output_2InverseWarp.nii.gz"),
                PathBuf::from("/w/output_1Affine.mat"),
                PathBuf::from("/w/trans.mat"),
            ]
        );
        assert_eq!(outputs["reverse_invert_flags"].as_flags().unwrap(), &[false, true, true]);
        assert_eq!(
            outputs["reverse_forward_invert_flags"].as_flags().unwrap(),
            &[false, false, false]
        );
    }

    #[test]
    fn test_center_of_mass_initialisation() {
        let task = Registration::new().unwrap();
        let mut params = two_stage().with("collapse_output_transforms", false);
        params.remove("initial_moving_transform");
        params.remove("invert_initial_moving_transform");
        let params = params.with("initial_moving_transform_com", 1);

        let argv = task.command_line(&params).unwrap().argv();
        assert!(argv
            .windows(2)
            .any(|w| w == ["--initial-moving-transform", "[fixed1.nii,moving1.nii,1]"]));

        let outputs = task.outputs(&params, Path::new("/w")).unwrap();
        let forward = outputs["forward_transforms"].as_paths().unwrap();
        assert_eq!(forward[0], PathBuf::from("/w/output_0DerivedInitialMovingTranslation.mat"));
        assert_eq!(outputs["reverse_invert_flags"].as_flags().unwrap(), &[false, true, true]);
    }

    #[test]
    fn test_composite_outputs() {
        let task = Registration::new().unwrap();
        let params = two_stage()
            .with("write_composite_transform", true)
            .with("output_warped_image", true)
            .with("output_inverse_warped_image", true)
            .with("save_state", "state.h5");
        let outputs = task.outputs(&params, Path::new("/w")).unwrap();
        assert_eq!(
            outputs["composite_transform"].as_path().unwrap(),
            Path::new("/w/output_Composite.h5")
        );
        assert_eq!(
            outputs["inverse_composite_transform"].as_path().unwrap(),
            Path::new("/w/output_InverseComposite.h5")
        );
        assert!(!outputs.contains_key("forward_transforms"));
        assert_eq!(
            outputs["warped_image"].as_path().unwrap(),
            Path::new("/w/output__Warped.nii.gz")
        );
        assert_eq!(
            outputs["inverse_warped_image"].as_path().unwrap(),
            Path::new("/w/output__InverseWarped.nii.gz")
        );
        assert_eq!(outputs["save_state"].as_path().unwrap(), Path::new("/w/state.h5"));

        let argv = task.command_line(&params).unwrap().argv();
        assert!(argv.windows(2).any(|w| w == ["--save-state", "state.h5"]));
        assert!(argv.windows(2).any(|w| w == [
            "--output",
            "[output_,output__Warped.nii.gz,output__InverseWarped.nii.gz]"
        ]));
    }

    #[test]
    fn test_per_stage_lengths() {
        let task = Registration::new().unwrap();
        let err = task
            .command_line(&two_stage().with("metric", vec!["Mattes"]))
            .unwrap_err();
        assert_eq!(err, TaskError::length_mismatch("metric", 1, "transforms", 2));

        let params = two_stage().with(
            "shrink_factors",
            Value::List(vec![Value::from(vec![2, 1]), Value::from(vec![2, 1])]),
        );
        let err = task.command_line(&params).unwrap_err();
        assert_eq!(
            err,
            TaskError::length_mismatch("shrink_factors[1]", 2, "number_of_iterations[1]", 3)
        );
    }

    #[test]
    fn test_masks_and_quantiles() {
        let task = Registration::new().unwrap();
        let argv = task
            .command_line(&two_stage().with("fixed_image_mask", "fixed_mask.nii"))
            .unwrap()
            .argv();
        assert!(argv.windows(2).any(|w| w == ["--masks", "[fixed_mask.nii,NULL]"]));

        let argv = task
            .command_line(&two_stage().with("fixed_image_masks", vec!["fm.nii", "NULL"]))
            .unwrap()
            .argv();
        assert_eq!(
            argv.iter().filter(|t| *t == "--masks").count(),
            2,
            "one mask pair per stage"
        );
        assert!(argv.contains(&"[NULL,NULL]".to_string()));

        let err = task
            .command_line(&two_stage().with("winsorize_lower_quantile", 0.99))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidValue { .. }));

        let err = task
            .command_line(&two_stage().with("transforms", vec!["Affine", "Warp"]))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidChoice { .. }));
    }
}
