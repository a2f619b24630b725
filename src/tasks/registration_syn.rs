// registration_syn.rs - antsRegistration composed from a SyN transform type preset

use std::path::Path;

use crate::core::stage::LevelFields;
use crate::core::{
    Bindings, Convergence, FieldKind, FieldSpec, Metric, MetricKind, Result, Schema, SchemaBuilder,
    SigmaUnits, Stage, Transform, TransformKind,
};

use super::common::{num_threads_field, INTERPOLATIONS};
use super::registration::{
    winsorize_option, InitialTransform, RegistrationOptions, RegistrationPlan,
};
use super::traits::{OutputMap, Task};

pub const TRANSFORM_TYPES: &[&str] = &["t", "r", "a", "s", "sr", "so", "b", "br", "bo"];

const LINEAR_ITERATIONS: [i64; 4] = [1000, 500, 250, 100];
const QUICK_LINEAR_ITERATIONS: [i64; 4] = [1000, 500, 250, 0];
const SYN_ITERATIONS: [i64; 4] = [100, 70, 50, 20];
const QUICK_SYN_ITERATIONS: [i64; 4] = [100, 70, 50, 0];

/// Which of the three fixed stages a transform type enables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSelection {
    pub linear: Option<TransformKind>,
    pub affine: bool,
    pub deformable: Option<TransformKind>,
}

impl StageSelection {
    pub fn from_type(transform_type: &str) -> Self {
        let (linear, affine, deformable) = match transform_type {
            "t" => (Some(TransformKind::Translation), false, None),
            "r" => (Some(TransformKind::Rigid), false, None),
            "a" => (Some(TransformKind::Rigid), true, None),
            "s" => (Some(TransformKind::Rigid), true, Some(TransformKind::SyN)),
            "sr" => (Some(TransformKind::Rigid), false, Some(TransformKind::SyN)),
            "so" => (None, false, Some(TransformKind::SyN)),
            "b" => (Some(TransformKind::Rigid), true, Some(TransformKind::BSplineSyN)),
            "br" => (Some(TransformKind::Rigid), false, Some(TransformKind::BSplineSyN)),
            _ => (None, false, Some(TransformKind::BSplineSyN)),
        };
        Self {
            linear,
            affine,
            deformable,
        }
    }
}

#[derive(Debug)]
pub struct RegistrationSyn {
    schema: Schema,
}

impl RegistrationSyn {
    pub fn new() -> Result<Self> {
        let levels = |name: &str, help: &str, default: Vec<i64>| {
            FieldSpec::new(name, FieldKind::list(FieldKind::Int), help).default(default)
        };
        let sigmas = |name: &str| {
            FieldSpec::new(name, FieldKind::list(FieldKind::Float), "smoothing sigma per level")
                .default(vec![3, 2, 1, 0])
        };

        let schema = SchemaBuilder::new("registration_syn")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "image dimension (2 or 3)")
                    .default(3)
                    .allowed(vec![2, 3]),
            )
            .field(FieldSpec::new("fixed_image", FieldKind::File, "fixed image").mandatory())
            .field(FieldSpec::new("moving_image", FieldKind::File, "moving image").mandatory())
            .field(
                FieldSpec::new("output_prefix", FieldKind::Text, "prefix for output files")
                    .default("output"),
            )
            .field(
                FieldSpec::new("transform_type", FieldKind::Text, "t, r, a, s, sr, so, b, br or bo")
                    .default("s")
                    .allowed(TRANSFORM_TYPES.to_vec()),
            )
            .field(FieldSpec::new("quick", FieldKind::Bool, "use the quick presets").default(false))
            .field(
                FieldSpec::new(
                    "num_histogram_bins",
                    FieldKind::Int,
                    "histogram bins of the MI metrics",
                )
                .default(32),
            )
            .field(
                FieldSpec::new("radius", FieldKind::Int, "CC radius of the deformable stage")
                    .default(4),
            )
            .field(
                FieldSpec::new("spline_distance", FieldKind::Float, "spline distance of BSplineSyN")
                    .default(26),
            )
            .field(
                FieldSpec::new(
                    "gradient_step_size",
                    FieldKind::Float,
                    "gradient step of SyN and BSplineSyN",
                )
                .default(0.1),
            )
            .field(FieldSpec::new(
                "initial_transforms",
                FieldKind::list(FieldKind::File),
                "initial transforms replacing the centre-of-mass alignment",
            ))
            .field(FieldSpec::new("fixed_mask", FieldKind::File, "mask applied to the fixed image"))
            .field(
                FieldSpec::new("moving_mask", FieldKind::File, "mask applied to the moving image")
                    .requires(&["fixed_mask"]),
            )
            .field(FieldSpec::new(
                "rigid_num_iterations",
                FieldKind::list(FieldKind::Int),
                "iterations per level of the rigid stage",
            ))
            .field(levels(
                "rigid_shrink_factors",
                "shrink factor per level of the rigid stage",
                vec![8, 4, 2, 1],
            ))
            .field(sigmas("rigid_smoothing_sigmas"))
            .field(FieldSpec::new(
                "affine_num_iterations",
                FieldKind::list(FieldKind::Int),
                "iterations per level of the affine stage",
            ))
            .field(levels(
                "affine_shrink_factors",
                "shrink factor per level of the affine stage",
                vec![8, 4, 2, 1],
            ))
            .field(sigmas("affine_smoothing_sigmas"))
            .field(FieldSpec::new(
                "syn_num_iterations",
                FieldKind::list(FieldKind::Int),
                "iterations per level of the deformable stage",
            ))
            .field(levels(
                "syn_shrink_factors",
                "shrink factor per level of the deformable stage",
                vec![8, 4, 2, 1],
            ))
            .field(sigmas("syn_smoothing_sigmas"))
            .field(
                FieldSpec::new("precision", FieldKind::Text, "float or double precision")
                    .default("double")
                    .allowed(vec!["float", "double"]),
            )
            .field(
                FieldSpec::new("use_histogram_matching", FieldKind::Bool, "use histogram matching")
                    .default(false),
            )
            .field(
                FieldSpec::new(
                    "use_reproducible_mode",
                    FieldKind::Bool,
                    "deterministic metrics (GC linear, CC deformable)",
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
                    "interpolation",
                    FieldKind::Text,
                    "interpolation of the warped images",
                )
                .default("Linear")
                .allowed(INTERPOLATIONS.to_vec()),
            )
            .field(
                FieldSpec::new(
                    "winsorize_lower_quantile",
                    FieldKind::Float,
                    "lower winsorize quantile",
                )
                .default(0.005),
            )
            .field(
                FieldSpec::new(
                    "winsorize_upper_quantile",
                    FieldKind::Float,
                    "upper winsorize quantile",
                )
                .default(0.995),
            )
            .field(FieldSpec::new("random_seed", FieldKind::Int, "fix random seed"))
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }

    fn iterations(bound: &Bindings, field: &str, full: [i64; 4], quick: [i64; 4]) -> Vec<i64> {
        match bound.get_int_list(field) {
            Some(its) => its,
            None if bound.flag("quick") => quick.to_vec(),
            None => full.to_vec(),
        }
    }

    fn stage(
        bound: &Bindings,
        prefix: &str,
        enabled: bool,
        transform: Transform,
        metric: Metric,
        default_iterations: ([i64; 4], [i64; 4]),
    ) -> Stage {
        let field = |suffix: &str| format!("{}_{}", prefix, suffix);
        let (full, quick) = default_iterations;
        Stage {
            label: prefix.to_string(),
            enabled,
            transform,
            metrics: vec![metric],
            convergence: Convergence {
                iterations: Self::iterations(bound, &field("num_iterations"), full, quick),
                threshold: 1e-6,
                window: 10,
            },
            shrink_factors: bound.get_int_list(&field("shrink_factors")).unwrap_or_default(),
            smoothing_sigmas: bound.get_float_list(&field("smoothing_sigmas")).unwrap_or_default(),
            sigma_units: SigmaUnits::Vox,
            restrict_deformation: None,
            masks: None,
            fields: LevelFields::new(
                &field("num_iterations"),
                &field("shrink_factors"),
                &field("smoothing_sigmas"),
            ),
        }
    }

    /// Resolve the preset into the Rigid, Affine and deformable stages
    pub fn plan(&self, bound: &Bindings) -> Result<RegistrationPlan> {
        let fixed = bound.require_render("fixed_image")?;
        let moving = bound.require_render("moving_image")?;
        let prefix = bound.require_str("output_prefix")?.to_string();
        let selection = StageSelection::from_type(bound.require_str("transform_type")?);
        let bins = bound.require_int("num_histogram_bins")?;
        let step = bound.require_float("gradient_step_size")?;
        let reproducible = bound.flag("use_reproducible_mode");

        let linear_metric = if reproducible {
            Metric::new(MetricKind::GC, &fixed, &moving, 1.0, 1)
                .with_sampling("Regular", Some(0.25))
        } else {
            Metric::new(MetricKind::MI, &fixed, &moving, 1.0, bins)
                .with_sampling("Regular", Some(0.25))
        };
        let deformable_metric = if bound.flag("quick") && !reproducible {
            Metric::new(MetricKind::MI, &fixed, &moving, 1.0, bins)
        } else {
            Metric::new(MetricKind::CC, &fixed, &moving, 1.0, bound.require_int("radius")?)
        };

        let linear_iterations = (LINEAR_ITERATIONS, QUICK_LINEAR_ITERATIONS);
        let rigid = Self::stage(
            bound,
            "rigid",
            selection.linear.is_some(),
            Transform::new(selection.linear.unwrap_or(TransformKind::Rigid), vec![0.1]),
            linear_metric.clone(),
            linear_iterations,
        );
        let affine = Self::stage(
            bound,
            "affine",
            selection.affine,
            Transform::new(TransformKind::Affine, vec![0.1]),
            linear_metric,
            linear_iterations,
        );
        let deformable_transform = match selection.deformable {
            Some(TransformKind::BSplineSyN) => Transform::new(
                TransformKind::BSplineSyN,
                vec![step, bound.require_float("spline_distance")?, 0.0, 3.0],
            ),
            _ => Transform::new(TransformKind::SyN, vec![step, 3.0, 0.0]),
        };
        let syn = Self::stage(
            bound,
            "syn",
            selection.deformable.is_some(),
            deformable_transform,
            deformable_metric,
            (SYN_ITERATIONS, QUICK_SYN_ITERATIONS),
        );

        let initial = match bound.get_str_list("initial_transforms") {
            Some(files) => InitialTransform::Files(files.into_iter().map(|f| (f, false)).collect()),
            None => InitialTransform::CenterOfMass {
                fixed: fixed.clone(),
                moving: moving.clone(),
                mode: 1,
            },
        };

        let masks = bound.render("fixed_mask").map(|fixed_mask| {
            (fixed_mask, bound.render("moving_mask").unwrap_or_else(|| "NULL".to_string()))
        });

        let plan = RegistrationPlan {
            options: RegistrationOptions {
                dimension: bound.require_int("dimension")?,
                float: Some(bound.require_str("precision")? == "float"),
                restore_state: None,
                save_state: None,
                warped_image: Some(format!("{}Warped.nii.gz", prefix)),
                inverse_warped_image: Some(format!("{}InverseWarped.nii.gz", prefix)),
                prefix,
                interpolation: bound.require_render("interpolation")?,
                winsorize: winsorize_option(bound)?.or(Some((
                    bound.require_float("winsorize_lower_quantile")?,
                    bound.require_float("winsorize_upper_quantile")?,
                ))),
                initial,
                initialize_per_stage: false,
                collapse: bound.flag("collapse_output_transforms"),
                histogram_matching: bound.flag("use_histogram_matching"),
                masks,
                write_composite: false,
                random_seed: bound.get_int("random_seed"),
                verbose: false,
            },
            stages: vec![rigid, affine, syn],
        };
        plan.validate()?;
        Ok(plan)
    }
}

impl Task for RegistrationSyn {
    fn name(&self) -> &'static str {
        "registration_syn"
    }

    fn executable(&self) -> &'static str {
        "antsRegistration"
    }

    fn description(&self) -> &'static str {
        "Rigid, affine and SyN registration from a transform type preset"
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
