use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::time::Duration;

use scene_engine::{Engine, EngineConfig, GenerateRequest};
use scene_script::{parse_program, validate};

type DynError = Box<dyn Error>;
type Flags = HashMap<String, String>;

const DEMO_SPHERE: &str = "set_material({roughness: 0.35})\nsphere_mesh(0, 0, -3, 0.5, 0.8, 0.3, 0.2, 48)";

const DEMO_TERRAIN: &str = "grid(SCENE_MIN_X, SCENE_MIN_Z, SCENE_MAX_X, SCENE_MAX_Z, 48, 48,\n  |x, z| SCENE_MIN_Y + 0.4 * (fbm2(x * 0.7, z * 0.7) + 1),\n  |x, z| {\n    let h = fbm2(x * 0.7, z * 0.7)\n    [0.25 + 0.2 * h, 0.45 + 0.1 * h, 0.2]\n  })";

const DEMO_TWISTED_TORUS: &str = "sdf_mesh(\n  |x, y, z| {\n    let p = twist(x, y, z + 3, 3.0)\n    sd_torus(p[0], p[1], p[2], 0.5, 0.15)\n  },\n  |x, y, z| [0.7, 0.4, 0.9],\n  [-0.85, -0.25, -3.85],\n  [0.85, 0.25, -2.15],\n  48\n)";

fn main() -> Result<(), DynError> {
    env_logger::init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "generate" => run_generate(&args[1..]),
        "validate" => run_validate(&args[1..]),
        "demo" => run_demo(&args[1..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn run_generate(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let source = fs::read_to_string(required_str(&flags, "--source-file")?)?;
    let seed = optional_u32(&flags, "--seed", 0)?;
    let description = optional_str(&flags, "--description", "").to_string();
    let timeout_secs = optional_u64(&flags, "--timeout-secs", 120)?;

    let mut engine = Engine::new(EngineConfig {
        timeout: Duration::from_secs(timeout_secs),
        ..EngineConfig::default()
    });
    let summary = engine.generate(&GenerateRequest {
        code: source,
        description,
        seed,
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_validate(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let source = fs::read_to_string(required_str(&flags, "--source-file")?)?;

    let program = parse_program(&source)?;
    validate(&program)?;
    println!("valid");
    Ok(())
}

fn run_demo(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let scene = optional_str(&flags, "--scene", "sphere");
    let seed = optional_u32(&flags, "--seed", 0)?;
    let source = demo_source(scene).ok_or_else(|| format!("unknown demo scene: {scene}"))?;

    let mut engine = Engine::default();
    let summary = engine.generate(&GenerateRequest {
        code: source.to_string(),
        description: format!("demo: {scene}"),
        seed,
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn demo_source(scene: &str) -> Option<&'static str> {
    match scene {
        "sphere" => Some(DEMO_SPHERE),
        "terrain" => Some(DEMO_TERRAIN),
        "twisted-torus" => Some(DEMO_TWISTED_TORUS),
        _ => None,
    }
}

fn parse_flags(args: &[String]) -> Result<Flags, DynError> {
    if !args.len().is_multiple_of(2) {
        return Err("expected flag-value pairs".into());
    }

    let mut flags = HashMap::new();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        if !flag.starts_with("--") {
            return Err(format!("expected flag at position {}", index + 1).into());
        }
        let value = args[index + 1].clone();
        if flags.insert(flag.to_string(), value).is_some() {
            return Err(format!("duplicate flag: {flag}").into());
        }
        index += 2;
    }
    Ok(flags)
}

fn required_str<'a>(flags: &'a Flags, key: &str) -> Result<&'a str, DynError> {
    flags
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("missing required {key}").into())
}

fn optional_str<'a>(flags: &'a Flags, key: &str, default: &'a str) -> &'a str {
    flags.get(key).map(String::as_str).unwrap_or(default)
}

fn optional_u32(flags: &Flags, key: &str, default: u32) -> Result<u32, DynError> {
    match flags.get(key) {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| format!("invalid u32 for {key}: {err}").into()),
        None => Ok(default),
    }
}

fn optional_u64(flags: &Flags, key: &str, default: u64) -> Result<u64, DynError> {
    match flags.get(key) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|err| format!("invalid u64 for {key}: {err}").into()),
        None => Ok(default),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  scene-cli generate --source-file <path> [--seed <u32>] [--description <str>] [--timeout-secs <u64>]"
    );
    eprintln!("  scene-cli validate --source-file <path>");
    eprintln!("  scene-cli demo [--scene <sphere|terrain|twisted-torus>] [--seed <u32>]");
}

#[cfg(test)]
mod tests {
    use scene_engine::{Engine, GenerateRequest};

    use super::{demo_source, parse_flags, required_str};

    #[test]
    fn parses_flag_pairs() {
        let args = vec![
            "--source-file".to_string(),
            "scene.txt".to_string(),
            "--seed".to_string(),
            "9".to_string(),
        ];
        let flags = parse_flags(&args).expect("should parse flag pairs");
        assert_eq!(flags.get("--seed").map(String::as_str), Some("9"));
        assert_eq!(
            required_str(&flags, "--source-file").expect("required"),
            "scene.txt"
        );
    }

    #[test]
    fn rejects_dangling_flags() {
        assert!(parse_flags(&["--seed".to_string()]).is_err());
        assert!(parse_flags(&["seed".to_string(), "9".to_string()]).is_err());
    }

    #[test]
    fn every_demo_scene_generates_a_layer() {
        for scene in ["sphere", "terrain", "twisted-torus"] {
            let source = demo_source(scene).expect("known scene");
            let mut engine = Engine::default();
            let summary = engine
                .generate(&GenerateRequest {
                    code: source.to_string(),
                    description: scene.to_string(),
                    seed: 3,
                })
                .unwrap_or_else(|err| panic!("demo '{scene}' failed: {err}"));
            assert!(summary.vertex_count > 0, "demo '{scene}' emitted nothing");
        }
        assert!(demo_source("unknown").is_none());
    }

    #[test]
    fn generate_requires_a_source_file_flag() {
        let flags = parse_flags(&[]).expect("empty flags parse");
        assert!(required_str(&flags, "--source-file").is_err());
    }
}
