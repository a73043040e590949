use std::io::Write;

use anyhow::*;

const USAGE: &str = "usage: ngl-specs [specs|bindings]";

fn main() -> Result<()> {
    nodegl::init_logging();

    let output = match std::env::args().nth(1).as_deref() {
        None | Some("specs") => nodegl::specs::export_yaml(),
        Some("bindings") => nodegl::codegen::generate(&nodegl::specs::export()),
        Some(other) => bail!("unknown output \"{other}\"\n{USAGE}"),
    };
    std::io::stdout()
        .write_all(output.as_bytes())
        .context("writing to stdout")?;
    Ok(())
}
