use anyhow::*;
use std::env;
use std::fs;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "src/schema.rs"]
mod schema;

#[allow(dead_code)]
#[path = "src/codegen.rs"]
mod codegen;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=specs/nodes.specs");
    println!("cargo:rerun-if-changed=src/schema.rs");
    println!("cargo:rerun-if-changed=src/codegen.rs");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let specs_path = manifest_dir.join("specs").join("nodes.specs");
    let text = fs::read_to_string(&specs_path)
        .with_context(|| format!("reading {}", specs_path.display()))?;
    let specs = schema::NodeSpecs::parse(&text)
        .with_context(|| format!("parsing {}", specs_path.display()))?;

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    fs::write(out_dir.join("nodes_def.rs"), codegen::generate(&specs))?;

    Ok(())
}
