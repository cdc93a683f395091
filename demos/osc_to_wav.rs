//! Offline render of `osc~ 440` through `lop~ 1000` into a WAV file.
//!
//! Usage: `cargo run --example osc_to_wav [out.wav]`

use patchcore::dsl::PatchBuilder;
use patchcore::message::Token;
use patchcore::plan::Plan;
use patchcore::rt::{render_offline, write_wav, Runtime};
use patchcore::EngineConfig;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "osc_lop.wav".to_string());

    let mut patch = PatchBuilder::new();
    patch.node_named("osc", "osc~", &[Token::Float(440.0)]).unwrap();
    patch.node_named("lop", "lop~", &[Token::Float(1000.0)]).unwrap();
    patch.wire("osc", 0, "lop", 0).unwrap();
    let lop = patch.get("lop").unwrap().0;
    let graph = patch.build();

    let config = EngineConfig::with_sample_rate(48000.0);
    let plan = Plan::compile(&graph).unwrap();
    let mut runtime = Runtime::new(plan, &graph).unwrap();
    runtime.configure(config.clone()).unwrap();

    // One second of audio.
    let frames = config.sample_rate as usize;
    let samples = render_offline(&mut runtime, lop, 0, frames).unwrap();
    write_wav(&path, &samples, &config).unwrap();

    let peak = samples.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    println!("Wrote {} frames to {} (peak {:.3})", frames, path, peak);
}
