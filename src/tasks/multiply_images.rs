// multiply_images.rs - MultiplyImages: voxelwise product of an image with an image or a constant

use std::path::Path;

use crate::core::{Bindings, FieldKind, FieldSpec, Result, Schema, SchemaBuilder};

use super::common::{insert_file, num_threads_field};
use super::traits::{OutputMap, Task};

#[derive(Debug)]
pub struct MultiplyImages {
    schema: Schema,
}

impl MultiplyImages {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("multiply_images")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "image dimension (2 or 3)")
                    .mandatory()
                    .allowed(vec![2, 3]),
            )
            .field(FieldSpec::new("first_input", FieldKind::File, "image 1").mandatory())
            .field(
                FieldSpec::new(
                    "second_input",
                    FieldKind::Scalar,
                    "image 2 or multiplication weight",
                )
                .mandatory(),
            )
            .field(
                FieldSpec::new(
                    "output_product_image",
                    FieldKind::Text,
                    "name of the resulting image",
                )
                .mandatory(),
            )
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for MultiplyImages {
    fn name(&self) -> &'static str {
        "multiply_images"
    }

    fn executable(&self) -> &'static str {
        "MultiplyImages"
    }

    fn description(&self) -> &'static str {
        "Multiply an image by another image or by a constant"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        Ok(vec![
            bound.require_render("dimension")?,
            bound.require_render("first_input")?,
            bound.require_render("second_input")?,
            bound.require_render("output_product_image")?,
        ])
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        insert_file(
            &mut outputs,
            "output_product_image",
            work_dir,
            bound.require_str("output_product_image")?,
        );
        Ok(outputs)
    }
}
