// Export OpenAPI specification as JSON
//
// Usage: cargo run --bin export-openapi > docs/api/openapi.json

use flowgate_control_plane::openapi::ApiDoc;

fn main() -> anyhow::Result<()> {
    println!("{}", ApiDoc::to_json()?);
    Ok(())
}
