//! Print the OpenAPI document of hackrx-server as JSON.

use anyhow::Result;
use hackrx_server::docs::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    println!("{}", ApiDoc::openapi().to_pretty_json()?);
    Ok(())
}
