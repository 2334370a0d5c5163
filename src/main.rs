use plume::app::App;
use plume::engine::EngineConfig;

fn main() {
    env_logger::init();

    let config = EngineConfig {
        // The default quarter-second stagger suits small test populations;
        // spread a thousand particles across the lifetime range instead.
        stagger_step: 0.005,
        ..EngineConfig::default()
    };

    if let Err(e) = App::run(config) {
        eprintln!("event loop error: {}", e);
        std::process::exit(1);
    }
}
