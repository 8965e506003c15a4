//! Model baker
//!
//! Parses an OBJ model, deduplicates its vertices and writes the binary
//! cache the viewer loads at startup.
//!
//! Usage: `model_baker [input.obj] [output.bin]`
//! (defaults: `resources/chalet.obj`, `resources/chalet.bin`)

use chalet_engine::assets::{model_cache, ObjLoader};
use chalet_engine::foundation::logging;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_INPUT: &str = "resources/chalet.obj";
const DEFAULT_OUTPUT: &str = "resources/chalet.bin";

fn main() -> ExitCode {
    logging::init_with_level("info");

    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_INPUT.to_string()));
    let output = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string()));
    if args.next().is_some() {
        eprintln!("usage: model_baker [input.obj] [output.bin]");
        return ExitCode::FAILURE;
    }

    let mesh = match ObjLoader::load_obj(&input) {
        Ok(mesh) => mesh,
        Err(e) => {
            log::error!("Failed to parse {}: {}", input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Parsed {}: {} unique vertices, {} triangles",
        input.display(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );

    if let Err(e) = model_cache::write(&output, &mesh) {
        log::error!("Failed to write {}: {}", output.display(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
