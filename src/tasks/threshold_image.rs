// threshold_image.rs - ThresholdImage: binary, Otsu or Kmeans thresholding

use std::path::Path;

use crate::core::{Bindings, FieldKind, FieldSpec, Result, Schema, SchemaBuilder, TaskError};

use super::common::{insert_file, num_threads_field, output_name};
use super::traits::{OutputMap, Task};

const OUTPUT_TEMPLATE: &str = "{input_image}_resampled";

#[derive(Debug)]
pub struct ThresholdImage {
    schema: Schema,
}

impl ThresholdImage {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("threshold_image")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "dimension of output image")
                    .default(3)
                    .allowed(vec![2, 3, 4]),
            )
            .field(FieldSpec::new("input_image", FieldKind::File, "input image file").mandatory())
            .field(FieldSpec::new("output_image", FieldKind::Text, "output image file"))
            .field(
                FieldSpec::new("mode", FieldKind::Text, "whether to run Otsu / Kmeans thresholding")
                    .allowed(vec!["Otsu", "Kmeans"])
                    .requires(&["num_thresholds"]),
            )
            .field(FieldSpec::new("num_thresholds", FieldKind::Int, "number of thresholds"))
            .field(
                FieldSpec::new("input_mask", FieldKind::File, "input mask for Otsu, Kmeans")
                    .requires(&["num_thresholds"]),
            )
            .field(
                FieldSpec::new("th_low", FieldKind::Float, "lower threshold")
                    .requires(&["th_high"]),
            )
            .field(
                FieldSpec::new("th_high", FieldKind::Float, "upper threshold")
                    .requires(&["th_low"]),
            )
            .field(
                FieldSpec::new("inside_value", FieldKind::Float, "inside value")
                    .requires(&["th_low"]),
            )
            .field(
                FieldSpec::new("outside_value", FieldKind::Float, "outside value")
                    .requires(&["th_low"]),
            )
            .field(num_threads_field())
            .xor(&["mode", "th_low"])
            .xor(&["mode", "th_high"])
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for ThresholdImage {
    fn name(&self) -> &'static str {
        "threshold_image"
    }

    fn executable(&self) -> &'static str {
        "ThresholdImage"
    }

    fn description(&self) -> &'static str {
        "Threshold an image by intensity range or by Otsu/Kmeans classes"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, bound: &Bindings) -> Result<()> {
        if !bound.is_set("mode") && !bound.is_set("th_low") {
            return Err(TaskError::invalid_value(
                "mode",
                "either 'mode' or 'th_low'/'th_high' must be set",
            ));
        }
        if bound.is_set("outside_value") && !bound.is_set("inside_value") {
            return Err(TaskError::UnmetDependency {
                field: "outside_value".to_string(),
                requires: "inside_value".to_string(),
            });
        }
        Ok(())
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let mut args = vec![
            bound.require_render("dimension")?,
            bound.require_render("input_image")?,
            output_name(bound, "output_image", OUTPUT_TEMPLATE)?,
        ];

        if let Some(mode) = bound.get_str("mode") {
            args.push(mode.to_string());
            args.push(bound.require_render("num_thresholds")?);
            if let Some(mask) = bound.render("input_mask") {
                args.push(mask);
            }
        } else {
            args.push(bound.require_render("th_low")?);
            args.push(bound.require_render("th_high")?);
            for field in ["inside_value", "outside_value"] {
                if let Some(v) = bound.render(field) {
                    args.push(v);
                }
            }
        }
        Ok(args)
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        let name = output_name(bound, "output_image", OUTPUT_TEMPLATE)?;
        insert_file(&mut outputs, "output_image", work_dir, &name);
        Ok(outputs)
    }
}
