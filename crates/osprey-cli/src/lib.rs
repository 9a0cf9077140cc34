//! Osprey CLI - command line interface for transition scenarios.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use osprey_core::msgs::VtolState;
use osprey_core::params::AirframeKind;
use osprey_sim::scenario::{run_scenario, ScenarioAction, ScenarioConfig, ScenarioTrace};

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::parse_from(args);
    main_inner(args)
}

#[derive(Parser, Debug)]
#[command(name = "osprey-cli")]
#[command(about = "VTOL transition-coordinator scenario runner")]
#[command(version)]
pub struct Args {
    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Run a single scenario
    #[arg(long)]
    single: bool,

    // ── Scenario parameters ───────────────────────────────────
    #[arg(long, value_enum, default_value = "standard")]
    airframe: AirframeArg,

    #[arg(long, default_value_t = 20.0)]
    duration: f32,

    #[arg(long, default_value_t = 5.0)]
    initial_airspeed: f32,

    #[arg(long, default_value_t = 50.0)]
    initial_altitude: f32,

    /// Scenario time of the transition-to-FW request (s)
    #[arg(long, default_value_t = 0.5)]
    request_fw_at: f32,

    /// Scenario time of the transition-back request (s), if any
    #[arg(long)]
    request_mc_at: Option<f32>,

    /// Fly without a usable airspeed measurement
    #[arg(long)]
    no_airspeed_sensor: bool,

    // ── Coordinator tunables ──────────────────────────────────
    #[arg(long, default_value_t = 8.0)]
    blend_airspeed: f32,

    #[arg(long, default_value_t = 10.0)]
    transition_airspeed: f32,

    #[arg(long, default_value_t = 2.0)]
    min_transition_time: f32,

    #[arg(long, default_value_t = 0.33)]
    pusher_slew: f32,

    #[arg(long, default_value_t = 1.0)]
    pusher_target: f32,

    #[arg(long, default_value_t = 4.0)]
    back_transition_duration: f32,

    // ── Plant options ─────────────────────────────────────────
    #[arg(long, default_value_t = 12.0)]
    thrust_accel: f32,

    #[arg(long, default_value_t = 0.1)]
    drag_coeff: f32,

    // ── Sensor options ────────────────────────────────────────
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 0.0)]
    airspeed_noise: f32,

    // ── Sweep options ─────────────────────────────────────────
    /// Parameter to sweep across its bounds (e.g. VT_PSHER_SLEW)
    #[arg(long, default_value = "VT_PSHER_SLEW")]
    sweep_param: String,

    #[arg(long, default_value_t = 5)]
    sweep_steps: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AirframeArg {
    Standard,
    Tailsitter,
    Tiltrotor,
}

impl From<AirframeArg> for AirframeKind {
    fn from(arg: AirframeArg) -> Self {
        match arg {
            AirframeArg::Standard => AirframeKind::Standard,
            AirframeArg::Tailsitter => AirframeKind::Tailsitter,
            AirframeArg::Tiltrotor => AirframeKind::Tiltrotor,
        }
    }
}

fn main_inner(args: Args) -> Result<()> {
    println!("Osprey Transition Coordinator");
    println!("=============================\n");

    if args.single {
        run_single(&args)?;
    } else {
        run_sweep(&args)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Single Run
// ---------------------------------------------------------------------------
fn run_single(args: &Args) -> Result<()> {
    println!("Running single scenario...");

    let config = build_scenario_config(args);
    let trace = run_scenario(&config).context("scenario failed to start")?;

    print_scenario_stats(&trace);
    write_output(args, &trace)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Sweep Run
// ---------------------------------------------------------------------------
fn run_sweep(args: &Args) -> Result<()> {
    let spec = osprey_sim::param_spec(&args.sweep_param)
        .with_context(|| format!("unknown sweep parameter {}", args.sweep_param))?;

    println!("Sweeping {} over [{}, {}]", spec.name, spec.min, spec.max);

    let steps = args.sweep_steps.max(2);
    let mut summary_rows = Vec::new();

    for i in 0..steps {
        let value = spec.min + (spec.max - spec.min) * (i as f32 / (steps - 1) as f32);

        let mut config = build_scenario_config(args);
        apply_param(&mut config, &args.sweep_param, value)?;

        let trace = run_scenario(&config).context("scenario failed to start")?;
        let time_to_fw = trace.first_time_in(VtolState::Fw);

        match time_to_fw {
            Some(t) => println!(
                "Run {}/{} | {} = {:.3} -> FW after {:.2} s",
                i + 1,
                steps,
                spec.name,
                value,
                t
            ),
            None => println!(
                "Run {}/{} | {} = {:.3} -> never reached FW",
                i + 1,
                steps,
                spec.name,
                value
            ),
        }

        summary_rows.push((value, time_to_fw, trace.quadchute_events.len()));
    }

    // Write summary
    let path = args.output_dir.join("sweep_summary.csv");
    std::fs::create_dir_all(&args.output_dir)?;
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["value", "time_to_fw_s", "quadchute_count"])?;
    for (value, time_to_fw, quadchutes) in summary_rows {
        wtr.write_record(&[
            format!("{:.4}", value),
            time_to_fw.map_or(String::new(), |t| format!("{:.3}", t)),
            format!("{}", quadchutes),
        ])?;
    }
    wtr.flush()?;

    println!("\nSweep complete. Summary at {:?}", path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_scenario_config(args: &Args) -> ScenarioConfig {
    let mut config = ScenarioConfig::new(args.airframe.into());

    config.duration_s = args.duration;
    config.initial_airspeed = args.initial_airspeed;
    config.initial_altitude = args.initial_altitude;
    config.airspeed_noise_std = args.airspeed_noise;
    config.seed = args.seed;

    config.params.vt_arsp_blend = args.blend_airspeed;
    config.params.vt_arsp_trans = args.transition_airspeed;
    config.params.vt_trans_min_tm = args.min_transition_time;
    config.params.vt_psher_slew = args.pusher_slew;
    config.params.vt_f_trans_thr = args.pusher_target;
    config.params.vt_b_trans_dur = args.back_transition_duration;
    config.params.fw_use_airspd = !args.no_airspeed_sensor;

    config.plant.thrust_accel = args.thrust_accel;
    config.plant.drag_coeff = args.drag_coeff;

    if args.no_airspeed_sensor {
        config = config.with_event(0.0, ScenarioAction::DisableAirspeedSensor);
    }

    config = config.with_event(args.request_fw_at, ScenarioAction::RequestFwPilot);

    if let Some(at) = args.request_mc_at {
        config = config.with_event(at, ScenarioAction::RequestMcPilot);
    }

    config
}

fn apply_param(config: &mut ScenarioConfig, name: &str, value: f32) -> Result<()> {
    let params = &mut config.params;
    match name {
        "VT_ARSP_BLEND" => params.vt_arsp_blend = value,
        "VT_ARSP_TRANS" => params.vt_arsp_trans = value,
        "VT_TRANS_MIN_TM" => params.vt_trans_min_tm = value,
        "VT_F_TRANS_DUR" => params.vt_f_trans_dur = value,
        "VT_TRANS_TIMEOUT" => params.vt_trans_timeout = value,
        "VT_F_TRANS_THR" => params.vt_f_trans_thr = value,
        "VT_PSHER_SLEW" => params.vt_psher_slew = value,
        "VT_B_TRANS_DUR" => params.vt_b_trans_dur = value,
        "VT_B_TRANS_RAMP" => params.vt_b_trans_ramp = value,
        "VT_TILT_TRANS" => params.vt_tilt_trans = value,
        "VT_TRANS_P2_DUR" => params.vt_trans_p2_dur = value,
        "VT_BT_TILT_DUR" => params.vt_bt_tilt_dur = value,
        _ => bail!("parameter {name} cannot be swept"),
    }
    Ok(())
}

fn print_scenario_stats(trace: &ScenarioTrace) {
    let flight_time = trace.time.last().copied().unwrap_or(0.0);
    let time_to_fw = trace
        .first_time_in(VtolState::Fw)
        .map_or("never".to_string(), |t| format!("{:.2} s", t));

    println!("\nScenario Stats:");
    println!("  Ticks:        {}", trace.time.len());
    println!("  Flight Time:  {:.2} s", flight_time);
    println!("  Reached FW:   {}", time_to_fw);
    println!("  Final Mode:   {}", trace.final_mode().label());
    println!("  Quadchutes:   {}", trace.quadchute_events.len());
    println!("-----------------------------");
}

fn write_output(args: &Args, trace: &ScenarioTrace) -> Result<()> {
    std::fs::create_dir_all(&args.output_dir)?;

    match args.format {
        OutputFormat::Csv => {
            let path = args.output_dir.join("scenario.csv");
            let mut wtr = csv::Writer::from_path(&path)?;

            wtr.write_record([
                "time",
                "mode",
                "mc_weight_roll",
                "mc_weight_pitch",
                "mc_weight_yaw",
                "mc_weight_throttle",
                "forward_actuator",
                "airspeed",
                "altitude",
                "attitude_sp_pitch",
                "failure_latched",
            ])?;

            for i in 0..trace.time.len() {
                let weights = trace.mc_weights[i];
                wtr.write_record(&[
                    format!("{:.4}", trace.time[i]),
                    trace.mode[i].label().to_string(),
                    format!("{:.4}", weights[0]),
                    format!("{:.4}", weights[1]),
                    format!("{:.4}", weights[2]),
                    format!("{:.4}", weights[3]),
                    format!("{:.4}", trace.forward_actuator[i]),
                    format!("{:.4}", trace.airspeed[i]),
                    format!("{:.4}", trace.altitude[i]),
                    format!("{:.4}", trace.attitude_sp_pitch[i]),
                    format!("{}", trace.failure_latched[i]),
                ])?;
            }

            wtr.flush()?;
            println!("Trace written to {:?}", path);
        }
        OutputFormat::Json => {
            let path = args.output_dir.join("scenario.json");
            let summary = serde_json::json!({
                "ticks": trace.time.len(),
                "time_to_fw_s": trace.first_time_in(VtolState::Fw),
                "final_mode": trace.final_mode().label(),
                "quadchutes": trace.quadchute_events.iter()
                    .map(|e| e.reason.event_id())
                    .collect::<Vec<_>>(),
                "time": &trace.time,
                "mode": trace.mode.iter().map(|m| m.label()).collect::<Vec<_>>(),
                "mc_weight_roll": trace.mc_weights.iter().map(|w| w[0]).collect::<Vec<_>>(),
                "forward_actuator": &trace.forward_actuator,
                "airspeed": &trace.airspeed,
            });
            std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
            println!("Trace written to {:?}", path);
        }
    }

    Ok(())
}
