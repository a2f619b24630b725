// image_math.rs - ImageMath: arithmetic and morphology operations on images

use std::path::Path;

use crate::core::{Bindings, FieldKind, FieldSpec, Result, Schema, SchemaBuilder};

use super::common::{insert_file, num_threads_field, output_name};
use super::traits::{OutputMap, Task};

const OUTPUT_TEMPLATE: &str = "{op1}_maths";

#[derive(Debug)]
pub struct ImageMath {
    schema: Schema,
}

impl ImageMath {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("image_math")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "dimension of output image")
                    .default(3)
                    .allowed(vec![2, 3, 4]),
            )
            .field(FieldSpec::new("output_image", FieldKind::Text, "output image file"))
            .field(
                FieldSpec::new(
                    "operation",
                    FieldKind::Text,
                    "mathematical operation, e.g. m, +, G, MD",
                )
                .mandatory(),
            )
            .field(FieldSpec::new("op1", FieldKind::File, "first operator").mandatory())
            .field(FieldSpec::new("op2", FieldKind::Scalar, "second operator"))
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for ImageMath {
    fn name(&self) -> &'static str {
        "image_math"
    }

    fn executable(&self) -> &'static str {
        "ImageMath"
    }

    fn description(&self) -> &'static str {
        "Operations over images"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let mut args = vec![
            bound.require_render("dimension")?,
            output_name(bound, "output_image", OUTPUT_TEMPLATE)?,
            bound.require_render("operation")?,
            bound.require_render("op1")?,
        ];
        if let Some(op2) = bound.render("op2") {
            args.push(op2);
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
