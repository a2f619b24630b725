// stage.rs - Registration stages and their composition into antsRegistration arguments

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

use super::error::{Result, TaskError};
use super::format::{bracket, call, join_floats, join_x};
use super::value::format_float;

/// Transform models understood by antsRegistration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransformKind {
    Translation,
    Rigid,
    Similarity,
    Affine,
    CompositeAffine,
    BSpline,
    GaussianDisplacementField,
    BSplineDisplacementField,
    TimeVaryingVelocityField,
    TimeVaryingBSplineVelocityField,
    SyN,
    BSplineSyN,
    Exponential,
    BSplineExponential,
}

impl TransformKind {
    pub const ALL: &'static [TransformKind] = &[
        TransformKind::Translation,
        TransformKind::Rigid,
        TransformKind::Similarity,
        TransformKind::Affine,
        TransformKind::CompositeAffine,
        TransformKind::BSpline,
        TransformKind::GaussianDisplacementField,
        TransformKind::BSplineDisplacementField,
        TransformKind::TimeVaryingVelocityField,
        TransformKind::TimeVaryingBSplineVelocityField,
        TransformKind::SyN,
        TransformKind::BSplineSyN,
        TransformKind::Exponential,
        TransformKind::BSplineExponential,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::Translation => "Translation",
            TransformKind::Rigid => "Rigid",
            TransformKind::Similarity => "Similarity",
            TransformKind::Affine => "Affine",
            TransformKind::CompositeAffine => "CompositeAffine",
            TransformKind::BSpline => "BSpline",
            TransformKind::GaussianDisplacementField => "GaussianDisplacementField",
            TransformKind::BSplineDisplacementField => "BSplineDisplacementField",
            TransformKind::TimeVaryingVelocityField => "TimeVaryingVelocityField",
            TransformKind::TimeVaryingBSplineVelocityField => "TimeVaryingBSplineVelocityField",
            TransformKind::SyN => "SyN",
            TransformKind::BSplineSyN => "BSplineSyN",
            TransformKind::Exponential => "Exponential",
            TransformKind::BSplineExponential => "BSplineExponential",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(TransformKind::name).collect()
    }

    /// Kinds folded into `GenericAffine` when outputs are collapsed
    pub fn is_linear(&self) -> bool {
        matches!(
            self,
            TransformKind::Rigid
                | TransformKind::Affine
                | TransformKind::Translation
                | TransformKind::CompositeAffine
                | TransformKind::Similarity
        )
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| TaskError::InvalidChoice {
                field: "transforms".to_string(),
                value: s.to_string(),
                allowed: Self::names().into_iter().map(String::from).collect(),
            })
    }
}

/// File written by antsRegistration for the transform at position `count`.
///
/// Returns the name and whether the file must be applied inverted. `transform` may
/// also be one of the pseudo kinds `GenericAffine` (collapsed linear stack) and
/// `Initial` (derived centre-of-mass translation). Anything else is treated as a
/// displacement field, which is never applied inverted.
pub fn transform_file_name(
    prefix: &str,
    count: usize,
    transform: &str,
    inverse: bool,
) -> (String, bool) {
    let low_dimensional = match transform {
        "Rigid" => Some("Rigid.mat"),
        "Affine" | "CompositeAffine" => Some("Affine.mat"),
        "GenericAffine" => Some("GenericAffine.mat"),
        "Similarity" => Some("Similarity.mat"),
        "Translation" => Some("Translation.mat"),
        "BSpline" => Some("BSpline.txt"),
        "Initial" => Some("DerivedInitialMovingTranslation.mat"),
        _ => None,
    };
    match low_dimensional {
        Some(suffix) => (format!("{}{}{}", prefix, count, suffix), inverse),
        None if inverse => (format!("{}{}InverseWarp.nii.gz", prefix, count), false),
        None => (format!("{}{}Warp.nii.gz", prefix, count), false),
    }
}

/// A transform with its gradient step and model parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transform {
    pub kind: TransformKind,
    pub params: Vec<f64>,
}

impl Transform {
    pub fn new(kind: TransformKind, params: Vec<f64>) -> Self {
        Self { kind, params }
    }

    /// `SyN[0.1,3,0]`
    pub fn token(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| format_float(*p)).collect();
        call(self.kind.name(), &params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricKind {
    CC,
    MI,
    Mattes,
    MeanSquares,
    Demons,
    GC,
}

impl MetricKind {
    pub const NAMES: &'static [&'static str] = &[
        "CC",
        "MI",
        "Mattes",
        "MeanSquares",
        "Demons",
        "GC",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::CC => "CC",
            MetricKind::MI => "MI",
            MetricKind::Mattes => "Mattes",
            MetricKind::MeanSquares => "MeanSquares",
            MetricKind::Demons => "Demons",
            MetricKind::GC => "GC",
        }
    }
}

impl FromStr for MetricKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CC" => Ok(MetricKind::CC),
            "MI" => Ok(MetricKind::MI),
            "Mattes" => Ok(MetricKind::Mattes),
            "MeanSquares" => Ok(MetricKind::MeanSquares),
            "Demons" => Ok(MetricKind::Demons),
            "GC" => Ok(MetricKind::GC),
            other => Err(TaskError::InvalidChoice {
                field: "metric".to_string(),
                value: other.to_string(),
                allowed: Self::NAMES.iter().map(|n| n.to_string()).collect(),
            }),
        }
    }
}

/// Point-set sampling of a similarity metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sampling {
    pub strategy: String,
    pub percentage: Option<f64>,
}

/// Similarity metric between a fixed and a moving image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub fixed: String,
    pub moving: String,
    pub weight: f64,
    /// Neighbourhood radius (CC) or histogram bins (MI, Mattes)
    pub radius_or_bins: i64,
    pub sampling: Option<Sampling>,
}

impl Metric {
    pub fn new(
        kind: MetricKind,
        fixed: &str,
        moving: &str,
        weight: f64,
        radius_or_bins: i64,
    ) -> Self {
        Self {
            kind,
            fixed: fixed.to_string(),
            moving: moving.to_string(),
            weight,
            radius_or_bins,
            sampling: None,
        }
    }

    pub fn with_sampling(mut self, strategy: &str, percentage: Option<f64>) -> Self {
        self.sampling = Some(Sampling {
            strategy: strategy.to_string(),
            percentage,
        });
        self
    }

    /// `MI[fixed,moving,1,32,Regular,0.25]`
    pub fn token(&self) -> String {
        let mut params = vec![
            self.fixed.clone(),
            self.moving.clone(),
            format_float(self.weight),
            self.radius_or_bins.to_string(),
        ];
        if let Some(sampling) = &self.sampling {
            params.push(sampling.strategy.clone());
            if let Some(pct) = sampling.percentage {
                params.push(format_float(pct));
            }
        }
        call(self.kind.name(), &params)
    }
}

/// Per-level iteration budget with its stopping rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Convergence {
    pub iterations: Vec<i64>,
    pub threshold: f64,
    pub window: i64,
}

impl Convergence {
    /// `[1000x500x250x100,1e-6,10]`
    pub fn token(&self) -> String {
        bracket(&[
            join_x(&self.iterations),
            format_float(self.threshold),
            self.window.to_string(),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SigmaUnits {
    #[default]
    Vox,
    Mm,
}

impl SigmaUnits {
    pub fn suffix(&self) -> &'static str {
        match self {
            SigmaUnits::Vox => "vox",
            SigmaUnits::Mm => "mm",
        }
    }
}

impl FromStr for SigmaUnits {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vox" => Ok(SigmaUnits::Vox),
            "mm" => Ok(SigmaUnits::Mm),
            other => Err(TaskError::InvalidChoice {
                field: "sigma_units".to_string(),
                value: other.to_string(),
                allowed: vec!["vox".to_string(), "mm".to_string()],
            }),
        }
    }
}

/// Caller-facing names of a stage's level sequences, used in error reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelFields {
    pub iterations: String,
    pub shrink_factors: String,
    pub smoothing_sigmas: String,
}

impl LevelFields {
    pub fn new(iterations: &str, shrink_factors: &str, smoothing_sigmas: &str) -> Self {
        Self {
            iterations: iterations.to_string(),
            shrink_factors: shrink_factors.to_string(),
            smoothing_sigmas: smoothing_sigmas.to_string(),
        }
    }

    /// Fields of stage `index` in the parallel-list form of antsRegistration
    pub fn indexed(index: usize) -> Self {
        Self {
            iterations: format!("number_of_iterations[{}]", index),
            shrink_factors: format!("shrink_factors[{}]", index),
            smoothing_sigmas: format!("smoothing_sigmas[{}]", index),
        }
    }
}

/// One phase of a multi-stage registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub label: String,
    pub enabled: bool,
    pub transform: Transform,
    pub metrics: Vec<Metric>,
    pub convergence: Convergence,
    pub shrink_factors: Vec<i64>,
    pub smoothing_sigmas: Vec<f64>,
    pub sigma_units: SigmaUnits,
    pub restrict_deformation: Option<Vec<f64>>,
    pub masks: Option<(String, String)>,
    pub fields: LevelFields,
}

impl Stage {
    /// Every multi-resolution sequence must describe the same number of levels
    pub fn check_levels(&self) -> Result<()> {
        let levels = self.convergence.iterations.len();
        if levels == 0 {
            return Err(TaskError::invalid_value(
                &self.fields.iterations,
                "needs at least one level",
            ));
        }
        if self.shrink_factors.len() != levels {
            return Err(TaskError::length_mismatch(
                &self.fields.shrink_factors,
                self.shrink_factors.len(),
                &self.fields.iterations,
                levels,
            ));
        }
        if self.smoothing_sigmas.len() != levels {
            return Err(TaskError::length_mismatch(
                &self.fields.smoothing_sigmas,
                self.smoothing_sigmas.len(),
                &self.fields.iterations,
                levels,
            ));
        }
        if self.metrics.is_empty() {
            return Err(TaskError::invalid_value(&self.label, "stage has no metric"));
        }
        Ok(())
    }

    pub fn tokens(&self) -> Vec<String> {
        let mut args = vec!["--transform".to_string(), self.transform.token()];
        for metric in &self.metrics {
            args.push("--metric".to_string());
            args.push(metric.token());
        }
        args.push("--convergence".to_string());
        args.push(self.convergence.token());
        args.push("--shrink-factors".to_string());
        args.push(join_x(&self.shrink_factors));
        args.push("--smoothing-sigmas".to_string());
        args.push(format!(
            "{}{}",
            join_floats(&self.smoothing_sigmas, "x"),
            self.sigma_units.suffix()
        ));
        if let Some(restrict) = &self.restrict_deformation {
            args.push("--restrict-deformation".to_string());
            args.push(join_floats(restrict, "x"));
        }
        if let Some((fixed, moving)) = &self.masks {
            args.push("--masks".to_string());
            args.push(bracket(&[fixed, moving]));
        }
        args
    }
}

/// Concatenate the arguments of every enabled stage, in the given order.
///
/// All enabled stages are checked before the first token is produced.
pub fn compose_stages(stages: &[Stage]) -> Result<Vec<String>> {
    for stage in stages.iter().filter(|s| s.enabled) {
        stage.check_levels()?;
    }

    let mut args = Vec::new();
    for stage in stages {
        if !stage.enabled {
            trace!(stage = %stage.label, "stage disabled, skipped");
            continue;
        }
        let tokens = stage.tokens();
        trace!(stage = %stage.label, tokens = tokens.len(), "stage composed");
        args.extend(tokens);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(label: &str, kind: TransformKind, its: Vec<i64>, shrink: Vec<i64>) -> Stage {
        let sigmas = shrink.iter().map(|_| 1.0).collect();
        Stage {
            label: label.to_string(),
            enabled: true,
            transform: Transform::new(kind, vec![0.1]),
            metrics: vec![Metric::new(MetricKind::MI, "f.nii", "m.nii", 1.0, 32)
                .with_sampling("Regular", Some(0.25))],
            convergence: Convergence {
                iterations: its,
                threshold: 1e-6,
                window: 10,
            },
            shrink_factors: shrink,
            smoothing_sigmas: sigmas,
            sigma_units: SigmaUnits::Vox,
            restrict_deformation: None,
            masks: None,
            fields: LevelFields::new(
                &format!("{}_num_iterations", label),
                &format!("{}_shrink_factors", label),
                &format!("{}_smoothing_sigmas", label),
            ),
        }
    }

    #[test]
    fn test_stage_tokens() {
        let tokens = stage("rigid", TransformKind::Rigid, vec![1000, 500], vec![2, 1]).tokens();
        assert_eq!(
            tokens,
            vec![
                "--transform",
                "Rigid[0.1]",
                "--metric",
                "MI[f.nii,m.nii,1,32,Regular,0.25]",
                "--convergence",
                "[1000x500,1e-6,10]",
                "--shrink-factors",
                "2x1",
                "--smoothing-sigmas",
                "1x1vox",
            ]
        );
    }

    #[test]
    fn test_disabled_stage_contributes_nothing() {
        let mut rigid = stage("rigid", TransformKind::Rigid, vec![10], vec![1]);
        rigid.enabled = false;
        let syn = stage("syn", TransformKind::SyN, vec![10], vec![1]);
        let args = compose_stages(&[rigid, syn]).unwrap();
        assert_eq!(args.iter().filter(|a| *a == "--transform").count(), 1);
        assert_eq!(args[1], "SyN[0.1]");
    }

    #[test]
    fn test_length_mismatch_before_tokens() {
        let rigid = stage("rigid", TransformKind::Rigid, vec![10], vec![1]);
        let syn = stage("syn", TransformKind::SyN, vec![100, 70, 50, 20, 10], vec![8, 4, 2, 1]);
        let err = compose_stages(&[rigid, syn]).unwrap_err();
        assert_eq!(
            err,
            TaskError::length_mismatch("syn_shrink_factors", 4, "syn_num_iterations", 5)
        );

        // Disabled stages are not checked
        let mut syn = stage("syn", TransformKind::SyN, vec![100, 70, 50, 20, 10], vec![8, 4, 2, 1]);
        syn.enabled = false;
        assert!(compose_stages(&[syn]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_levels_rejected() {
        let syn = stage("syn", TransformKind::SyN, vec![], vec![]);
        assert_eq!(
            compose_stages(&[syn]).unwrap_err(),
            TaskError::invalid_value("syn_num_iterations", "needs at least one level")
        );
    }

    #[test]
    fn test_transform_file_names() {
        assert_eq!(
            transform_file_name("out", 0, "Rigid", false),
            ("out0Rigid.mat".to_string(), false)
        );
        assert_eq!(
            transform_file_name("out", 0, "Rigid", true),
            ("out0Rigid.mat".to_string(), true)
        );
        assert_eq!(transform_file_name("out", 1, "CompositeAffine", false).0, "out1Affine.mat");
        assert_eq!(
            transform_file_name("out", 2, "SyN", false),
            ("out2Warp.nii.gz".to_string(), false)
        );
        assert_eq!(
            transform_file_name("out", 2, "SyN", true),
            ("out2InverseWarp.nii.gz".to_string(), false)
        );
        assert_eq!(
            transform_file_name("tx_", 0, "Initial", false).0,
            "tx_0DerivedInitialMovingTranslation.mat"
        );
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("BSplineSyN".parse::<TransformKind>().unwrap(), TransformKind::BSplineSyN);
        assert!("Warp".parse::<TransformKind>().is_err());
        assert!(TransformKind::Similarity.is_linear());
        assert!(!TransformKind::BSpline.is_linear());
        assert_eq!("mm".parse::<SigmaUnits>().unwrap().suffix(), "mm");
    }
}
