// create_jacobian_determinant_image.rs - CreateJacobianDeterminantImage wrapper

use std::path::Path;

use crate::core::{value::bool_token, Bindings, FieldKind, FieldSpec, Result, Schema, SchemaBuilder};

use super::common::{insert_file, num_threads_field, output_name};
use super::traits::{OutputMap, Task};

const OUTPUT_TEMPLATE: &str = "{warp_field}_jac";

#[derive(Debug)]
pub struct CreateJacobianDeterminantImage {
    schema: Schema,
}

impl CreateJacobianDeterminantImage {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("create_jacobian_determinant_image")
            .field(
                FieldSpec::new("dimensionality", FieldKind::Int, "image dimensionality")
                    .mandatory()
                    .allowed(vec![2, 3]),
            )
            .field(FieldSpec::new("warp_field", FieldKind::File, "displacement field").mandatory())
            .field(FieldSpec::new("output_image", FieldKind::Text, "output image"))
            .field(
                FieldSpec::new("calculate_log_jacobian", FieldKind::Bool, "calculate log jacobian")
                    .default(false),
            )
            .field(
                FieldSpec::new(
                    "calculate_geometric_jacobian",
                    FieldKind::Bool,
                    "calculate geometric jacobian",
                )
                .default(false),
            )
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }
}

impl Task for CreateJacobianDeterminantImage {
    fn name(&self) -> &'static str {
        "create_jacobian_determinant_image"
    }

    fn executable(&self) -> &'static str {
        "CreateJacobianDeterminantImage"
    }

    fn description(&self) -> &'static str {
        "Jacobian determinant of a displacement field"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        Ok(vec![
            bound.require_render("dimensionality")?,
            bound.require_render("warp_field")?,
            output_name(bound, "output_image", OUTPUT_TEMPLATE)?,
            bool_token(bound.flag("calculate_log_jacobian")).to_string(),
            bool_token(bound.flag("calculate_geometric_jacobian")).to_string(),
        ])
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        let name = output_name(bound, "output_image", OUTPUT_TEMPLATE)?;
        insert_file(&mut outputs, "output_image", work_dir, &name);
        Ok(outputs)
    }
}
