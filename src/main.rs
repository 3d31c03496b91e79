//! hanfe - Hangul/kana input-method interceptor for the Linux console
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Event Loop                    │
//! ├──────────────────────────────────────────────┤
//! │  Evdev reader (exclusive grab)               │
//! │                 ↓                            │
//! │  Mode engine → layout / composer / session   │
//! │                 ↓                            │
//! │  Emitter → uinput hex │ TTY helper │ PTY     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The same binary doubles as the TTY helper: when `HANFE_TTY_HELPER=1` it
//! serves the bridge socket instead of grabbing a keyboard.

mod bridge;
mod config;
mod constants;
mod dict;
mod emitter;
mod engine;
mod hangul;
mod input;
mod ioctl;
mod layout;

use anyhow::{anyhow, bail, Result};
use log::info;
use std::collections::HashSet;
use std::path::Path;

use crate::dict::Dictionary;
use crate::emitter::{DirectEmitter, Emitter, UinputEmitter};
use crate::engine::{Engine, InputMode, ModeSpec};
use crate::input::device::{detect_keyboard_device, install_signal_handlers, EvdevDevice};
use crate::layout::{Category, Layout};

/// Command-line options; values override the config file.
#[derive(Debug, Default)]
struct Options {
    device: Option<String>,
    layout: Option<String>,
    config: Option<String>,
    custom_pairs: Option<String>,
    dictionary: Option<String>,
    tty: Option<String>,
    pty: Option<String>,
    no_hex: bool,
    list_devices: bool,
    list_layouts: bool,
}

/// Print help message
fn print_help() {
    println!(
        r#"hanfe {} - Hangul/kana input-method interceptor for the Linux console

USAGE:
    hanfe [OPTIONS]

OPTIONS:
    -h, --help            Print this help message
    -V, --version         Print version information
    --device PATH         Keyboard device to grab (auto-detected when omitted)
    --layout NAME         Layout: dubeolsik, sebeolsik-390, kana86, latin
    --config PATH         Config file (default: ~/.config/hanfe/config.toml)
    --custom-pairs PATH   JSON key-pair overlay applied to the layout
    --dictionary PATH     Tab-separated dictionary enabling database mode
    --tty PATH            Controlling TTY for direct commit (auto-detected)
    --pty PATH            Mirror committed text into this PTY
    --no-hex              Direct commit instead of the uinput hex keyboard
    --list-devices        List keyboard-like evdev devices and exit
    --list-layouts        List built-in layouts and exit

EXAMPLES:
    sudo hanfe                        Grab the first keyboard, type via uinput
    sudo hanfe --no-hex               Inject through the TTY helper instead
    sudo hanfe --layout sebeolsik-390 --device /dev/input/event3

CONFIG FILE:
    ~/.config/hanfe/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn parse_args() -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("hanfe {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--device" => options.device = Some(next_value(&mut args, &arg)?),
            "--layout" => options.layout = Some(next_value(&mut args, &arg)?),
            "--config" => options.config = Some(next_value(&mut args, &arg)?),
            "--custom-pairs" => options.custom_pairs = Some(next_value(&mut args, &arg)?),
            "--dictionary" => options.dictionary = Some(next_value(&mut args, &arg)?),
            "--tty" => options.tty = Some(next_value(&mut args, &arg)?),
            "--pty" => options.pty = Some(next_value(&mut args, &arg)?),
            "--no-hex" => options.no_hex = true,
            "--list-devices" => options.list_devices = true,
            "--list-layouts" => options.list_layouts = true,
            other => return Err(anyhow!("unknown option '{}' (try --help)", other)),
        }
    }
    Ok(Some(options))
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("missing value for {}", flag))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if bridge::in_helper_mode() {
        if let Err(err) = bridge::run_helper() {
            eprintln!("hanfe-tty-helper: {:#}", err);
            std::process::exit(1);
        }
        return;
    }

    if let Err(err) = run() {
        eprintln!("hanfe: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Some(options) = parse_args()? else {
        return Ok(());
    };

    if options.list_layouts {
        for name in layout::available_layouts() {
            println!("{}", name);
        }
        return Ok(());
    }
    if options.list_devices {
        for device in input::device::list_keyboard_devices()? {
            println!("{}\t{}", device.path, device.name);
        }
        return Ok(());
    }

    let file_config = config::load(options.config.as_deref().map(Path::new))?;

    let pick = |cli: &Option<String>, file: &str| -> Option<String> {
        cli.clone()
            .filter(|v| !v.is_empty())
            .or_else(|| (!file.is_empty()).then(|| file.to_string()))
    };
    let device_path = pick(&options.device, &file_config.input.device);
    let layout_name =
        pick(&options.layout, &file_config.input.layout).unwrap_or_else(|| "dubeolsik".to_string());
    let custom_pairs_path = pick(&options.custom_pairs, &file_config.input.custom_pairs);
    let dictionary_path = pick(&options.dictionary, &file_config.dictionary.path);
    let pty_path = pick(&options.pty, &file_config.output.pty);
    let no_hex = options.no_hex || file_config.output.no_hex;

    // Layout ("latin" runs without a composing layout at all).
    let engine_layout = if layout_name.eq_ignore_ascii_case("latin") {
        None
    } else {
        let mut built = layout::load(&layout_name)?;
        if let Some(path) = &custom_pairs_path {
            let pairs = layout::custom::load_custom_pairs(Path::new(path))?;
            built = layout::custom::apply_custom_pairs(built, &pairs)?;
        }
        Some(built)
    };
    let hangul_name = engine_layout
        .as_ref()
        .map(|l| l.name().to_string())
        .unwrap_or_default();

    let dictionary = match &dictionary_path {
        Some(path) => Some(Dictionary::load(Path::new(path))?),
        None => None,
    };

    let toggle = config::resolve_toggle(
        &file_config.toggle,
        &hangul_name,
        engine_layout.is_some(),
    )?;

    // Output backend: direct commit needs a TTY (via the helper) or a PTY;
    // otherwise fall back to the uinput Unicode-hex keyboard.
    let tty_path = options
        .tty
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(bridge::tty_path_hint)
        .or_else(|| bridge::detect_tty_path().ok())
        .unwrap_or_default();
    let mut direct_commit =
        no_hex || !tty_path.is_empty() || pty_path.as_deref().is_some_and(|p| !p.is_empty());
    if direct_commit && tty_path.is_empty() && pty_path.is_none() {
        direct_commit = false;
    }

    let emitter: Box<dyn Emitter> = if direct_commit {
        let client = if tty_path.is_empty() {
            None
        } else {
            bridge::remember_tty_path(&tty_path);
            bridge::spawn_helper(&tty_path)?;
            bridge::attach()?
        };
        Box::new(DirectEmitter::new(client, pty_path.as_deref())?)
    } else {
        Box::new(UinputEmitter::open()?)
    };

    let device_path = match device_path {
        Some(path) => path,
        None => {
            let detected = detect_keyboard_device()?;
            info!("using keyboard {} ({})", detected.path, detected.name);
            detected.path
        }
    };
    let mut device = EvdevDevice::open(&device_path)?;

    let modes = build_modes(&toggle.mode_cycle, engine_layout, &hangul_name, dictionary)?;

    install_signal_handlers();

    let mut engine = Engine::new(modes, &toggle, emitter)?;
    engine.run(&mut device)
}

/// Instantiate the mode cycle. Entries with no backing (a pinyin mode
/// without a dictionary, an unknown name) are skipped; an empty result is
/// a configuration error.
fn build_modes(
    cycle: &[String],
    mut hangul_layout: Option<Layout>,
    hangul_name: &str,
    mut dictionary: Option<Dictionary>,
) -> Result<Vec<ModeSpec>> {
    let mut modes = Vec::new();
    let mut added = HashSet::new();

    for entry in cycle {
        let key = entry.to_lowercase();
        if added.contains(&key) {
            continue;
        }
        let spec = if key == "latin" {
            ModeSpec {
                name: "latin".to_string(),
                kind: InputMode::Latin,
                layout: None,
                dictionary: None,
            }
        } else if !hangul_name.is_empty() && key == hangul_name.to_lowercase() {
            let Some(built) = hangul_layout.take() else {
                continue;
            };
            let kind = if built.category() == Category::Kana {
                InputMode::Kana
            } else {
                InputMode::Hangul
            };
            ModeSpec {
                name: hangul_name.to_string(),
                kind,
                layout: Some(built),
                dictionary: None,
            }
        } else if key == "kana86" {
            ModeSpec {
                name: "kana86".to_string(),
                kind: InputMode::Kana,
                layout: Some(layout::load("kana86")?),
                dictionary: None,
            }
        } else if key == "pinyin" {
            let Some(dict) = dictionary.take() else {
                continue;
            };
            ModeSpec {
                name: "pinyin".to_string(),
                kind: InputMode::Database,
                layout: None,
                dictionary: Some(dict),
            }
        } else {
            continue;
        };
        added.insert(key);
        modes.push(spec);
    }

    if modes.is_empty() {
        bail!("no input modes available after applying toggle configuration");
    }
    Ok(modes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn build_modes_follows_cycle_order() {
        let layout = layout::load("dubeolsik").unwrap();
        let modes = build_modes(
            &cycle(&["dubeolsik", "latin"]),
            Some(layout),
            "dubeolsik",
            None,
        )
        .unwrap();
        assert_eq!(modes.len(), 2);
        assert_eq!(modes[0].name, "dubeolsik");
        assert_eq!(modes[0].kind, InputMode::Hangul);
        assert_eq!(modes[1].kind, InputMode::Latin);
    }

    #[test]
    fn build_modes_skips_pinyin_without_dictionary() {
        let modes = build_modes(&cycle(&["pinyin", "latin"]), None, "", None).unwrap();
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].kind, InputMode::Latin);
    }

    #[test]
    fn build_modes_includes_database_mode() {
        let dict = Dictionary::from_pairs(&[("ni", "你")]);
        let modes = build_modes(&cycle(&["latin", "pinyin"]), None, "", Some(dict)).unwrap();
        assert_eq!(modes.len(), 2);
        assert_eq!(modes[1].kind, InputMode::Database);
    }

    #[test]
    fn build_modes_maps_kana_category() {
        let layout = layout::load("kana86").unwrap();
        let modes =
            build_modes(&cycle(&["kana86", "latin"]), Some(layout), "kana86", None).unwrap();
        assert_eq!(modes[0].kind, InputMode::Kana);
    }

    #[test]
    fn build_modes_rejects_empty_result() {
        assert!(build_modes(&cycle(&["nope"]), None, "", None).is_err());
    }
}
