use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pf_core::units::convert::{k_to_degf, pa_to_psi, psi_to_pa};
use pf_cvcs::LetdownOrifice;
use pf_sim::{HeaterMode, HeatupConfig, HeatupSimulation, TickInputs};
use pf_steam::{latent_heat, p_sat, rho_liquid_sat, rho_vapor_sat, t_sat};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pf-cli")]
#[command(about = "Primaflow CLI - PWR primary-plant heatup simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cold-start heatup scenario and emit JSON snapshots
    Heatup {
        /// Time step in seconds
        #[arg(long, default_value_t = 1.0)]
        dt: f64,
        /// End time in seconds
        #[arg(long, default_value_t = 3600.0)]
        t_end: f64,
        /// Emit every N-th snapshot
        #[arg(long, default_value_t = 60)]
        record_every: u64,
        /// RHR heat input in watts
        #[arg(long, default_value_t = 8.0e6)]
        rhr_watts: f64,
        /// Letdown orifice lineup: 45, 75 or 120 gpm
        #[arg(long, default_value_t = 75)]
        orifice_gpm: u32,
        /// Output file (defaults to stdout, one JSON object per line)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query the saturation line
    Sat {
        /// Pressure in psia; prints the saturation temperature
        #[arg(long, conflicts_with = "temperature_f")]
        pressure_psia: Option<f64>,
        /// Temperature in F; prints the saturation pressure
        #[arg(long)]
        temperature_f: Option<f64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Heatup {
            dt,
            t_end,
            record_every,
            rhr_watts,
            orifice_gpm,
            output,
        } => cmd_heatup(dt, t_end, record_every, rhr_watts, orifice_gpm, output),
        Commands::Sat {
            pressure_psia,
            temperature_f,
        } => cmd_sat(pressure_psia, temperature_f),
    }
}

fn parse_orifice(gpm: u32) -> Result<LetdownOrifice> {
    match gpm {
        45 => Ok(LetdownOrifice::Gpm45),
        75 => Ok(LetdownOrifice::Gpm75),
        120 => Ok(LetdownOrifice::Gpm120),
        other => anyhow::bail!("no {other} gpm letdown lineup (expected 45, 75 or 120)"),
    }
}

fn cmd_heatup(
    dt: f64,
    t_end: f64,
    record_every: u64,
    rhr_watts: f64,
    orifice_gpm: u32,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = HeatupConfig {
        dt_s: dt,
        ..HeatupConfig::default()
    };
    let mut sim = HeatupSimulation::new(config).context("simulation setup failed")?;
    let inputs = TickInputs {
        heater_mode: HeaterMode::Full,
        rhr_heat_w: rhr_watts,
        // cold-start scenario runs with the RHR train lined up
        rhr_coupled: rhr_watts > 0.0,
        orifice: parse_orifice(orifice_gpm)?,
        ..TickInputs::default()
    };

    let mut out: BufWriter<Box<dyn Write>> = match output {
        Some(path) => BufWriter::new(Box::new(
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => BufWriter::new(Box::new(io::stdout())),
    };

    let ticks = (t_end / dt).ceil() as u64;
    for tick in 0..ticks {
        let report = sim
            .tick(&inputs)
            .with_context(|| format!("tick {tick} failed"))?;
        if report.solver_held {
            tracing::warn!(tick, "state held on solver non-convergence");
        }
        if tick % record_every.max(1) == 0 || tick + 1 == ticks {
            serde_json::to_writer(&mut out, &report.snapshot)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;

    let end = sim.snapshot()?;
    eprintln!(
        "done: t={:.0} s  P={:.1} psia  Tpzr={:.1} F  Trcs={:.1} F  level={:.1}%  phase={:?}",
        end.time_s,
        pa_to_psi(end.pressure_pa),
        k_to_degf(end.temperature_pzr_k),
        k_to_degf(end.temperature_rcs_k),
        100.0 * end.pzr_level_fraction,
        end.bubble_phase,
    );
    Ok(())
}

fn cmd_sat(pressure_psia: Option<f64>, temperature_f: Option<f64>) -> Result<()> {
    match (pressure_psia, temperature_f) {
        (Some(psia), None) => {
            let t = t_sat(psi_to_pa(psia))?;
            println!(
                "P = {psia:.2} psia: Tsat = {:.2} F ({t:.2} K), rho_f = {:.1} kg/m3, \
                 rho_g = {:.4} kg/m3, h_fg = {:.1} kJ/kg",
                k_to_degf(t),
                rho_liquid_sat(t)?,
                rho_vapor_sat(t)?,
                latent_heat(t)? / 1e3,
            );
        }
        (None, Some(f)) => {
            let t = pf_core::units::convert::degf_to_k(f);
            let p = p_sat(t)?;
            println!(
                "T = {f:.2} F ({t:.2} K): Psat = {:.2} psia ({p:.0} Pa)",
                pa_to_psi(p)
            );
        }
        _ => anyhow::bail!("pass exactly one of --pressure-psia or --temperature-f"),
    }
    Ok(())
}
