use std::path::PathBuf;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  bch_inspect <file.bch> [--full]");
        eprintln!();
        eprintln!("Prints a JSON summary of the decoded container; --full dumps the");
        eprintln!("entire model group.");
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let full = args.iter().any(|a| a == "--full");

    let buffer = match std::fs::read(&path) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    };

    let group = match bch_tools::decode(buffer) {
        Ok(group) => group,
        Err(e) => {
            eprintln!("Failed to decode '{}': {:?}", path.display(), e);
            std::process::exit(1);
        }
    };

    if full {
        match serde_json::to_string_pretty(&group) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize model group: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let summary = serde_json::json!({
        "models": group.models.iter().map(|m| serde_json::json!({
            "name": m.name,
            "materials": m.materials.len(),
            "bones": m.skeleton.len(),
            "meshes": m.meshes.iter().map(|mesh| serde_json::json!({
                "material": mesh.material_id,
                "vertices": mesh.vertices.len(),
                "indices": mesh.indices.len(),
                "skinning": format!("{:?}", mesh.skinning),
            })).collect::<Vec<_>>(),
            "min": m.min_vector.to_slice(),
            "max": m.max_vector.to_slice(),
        })).collect::<Vec<_>>(),
        "textures": group.textures.iter().map(|t| serde_json::json!({
            "name": t.name,
            "size": [t.width, t.height],
            "format": format!("{:?}", t.format),
        })).collect::<Vec<_>>(),
        "lights": group.lights.len(),
        "cameras": group.cameras.len(),
        "fogs": group.fogs.len(),
        "scenes": group.scenes.len(),
        "animations": {
            "skeletal": group.skeletal_animations.len(),
            "material": group.material_animations.len(),
            "visibility": group.visibility_animations.len(),
            "light": group.light_animations.len(),
            "camera": group.camera_animations.len(),
            "fog": group.fog_animations.len(),
        },
    });

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize summary: {}", e);
            std::process::exit(1);
        }
    }
}
