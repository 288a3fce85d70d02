mod heap;
mod plan;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use v2d::{
    Area, BitblitParams, BlendConf, BlendParams, ColorFormat, CscMode, FillColor, FillParams,
    Surface, V2d, V2dOpts,
};

use crate::heap::{DmaBuf, HeapAllocator, page_align};
use crate::plan::JobPlan;

const CLKRATE_SYSFS: &str = "/sys/bus/platform/devices/c0100000.v2d/clkrate";

const FRAME_W: u16 = 320;
const FRAME_H: u16 = 240;

#[derive(Parser, Debug)]
#[command(name = "v2d", version, about = "Drive the V2D 2D accelerator")]
struct Cli {
    /// Device node tasks are written to.
    #[arg(long, global = true, default_value = v2d::DEFAULT_DEVICE_PATH)]
    device: PathBuf,

    /// Set the V2D core clock before running.
    #[arg(long, global = true, value_enum)]
    rate: Option<ClockRate>,

    /// Completion-fence timeout in milliseconds. For bring-up only.
    #[arg(long, global = true, hide = true, default_value_t = 3000)]
    fence_timeout_ms: u64,

    /// More logging (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClockRate {
    #[value(name = "204M")]
    Mhz204,
    #[value(name = "307M")]
    Mhz307,
    #[value(name = "491M")]
    Mhz491,
}

impl ClockRate {
    fn hz(self) -> &'static str {
        match self {
            Self::Mhz204 => "204800000",
            Self::Mhz307 => "307200000",
            Self::Mhz491 => "491520000",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill a rectangle of a grey 320x240 RGBA8888 frame with a solid color.
    Fill(FillArgs),
    /// Copy a 200x180 region between two 320x240 RGBA8888 frames.
    Blit(CaseArgs),
    /// Blend a 320x240 NV12 frame into an NV12 destination.
    Blend(CaseArgs),
    /// Run a job described by a JSON plan.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct CaseArgs {
    /// Raw file loaded into the source buffer.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Raw file the destination buffer must match afterwards.
    #[arg(long)]
    expect: Option<PathBuf>,

    /// Write the destination buffer to this file afterwards.
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FillArgs {
    /// Fill color as RGBA8888 hex.
    #[arg(long, default_value = "00ffcc66", value_parser = parse_hex_u32)]
    color: u32,

    #[command(flatten)]
    case: CaseArgs,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Job plan JSON.
    #[arg(long)]
    plan: PathBuf,
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex color '{s}': {e}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(rate) = cli.rate {
        std::fs::write(CLKRATE_SYSFS, rate.hz())
            .with_context(|| format!("set v2d clock via '{CLKRATE_SYSFS}'"))?;
        tracing::info!(hz = rate.hz(), "v2d clock set");
    }

    let v2d = V2d::new(V2dOpts {
        device_path: cli.device.clone(),
        fence_timeout: Duration::from_millis(cli.fence_timeout_ms),
        ..V2dOpts::default()
    });
    let mut heaps = HeapAllocator::default();

    let result = match cli.cmd {
        Command::Fill(args) => cmd_fill(&v2d, &mut heaps, args),
        Command::Blit(args) => cmd_blit(&v2d, &mut heaps, args),
        Command::Blend(args) => cmd_blend(&v2d, &mut heaps, args),
        Command::Run(args) => cmd_run(&v2d, &mut heaps, args),
    };
    v2d::shutdown_shared_devices();
    result
}

fn alloc_frame(heaps: &mut HeapAllocator, len: u64, what: &str) -> anyhow::Result<DmaBuf> {
    let len = usize::try_from(len).context("frame size overflows usize")?;
    heaps
        .alloc_system(true, page_align(len))
        .with_context(|| format!("allocate {what} buffer ({len} bytes)"))
}

fn prepare(buf: &DmaBuf, fill: u8, input: Option<&Path>) -> anyhow::Result<()> {
    let mut map = buf.map().context("map dma-buf")?;
    map.fill(fill);
    if let Some(path) = input {
        let n = map
            .load(path)
            .with_context(|| format!("load '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = n, "input loaded");
    }
    Ok(())
}

fn finish(dst: &DmaBuf, len: u64, case: &CaseArgs) -> anyhow::Result<()> {
    if case.expect.is_none() && case.dump.is_none() {
        return Ok(());
    }
    let len = usize::try_from(len).context("frame size overflows usize")?;
    let map = dst.map().context("map destination")?;
    let out = &map[..len.min(dst.len())];

    if let Some(path) = &case.dump {
        std::fs::write(path, out).with_context(|| format!("write '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = &case.expect {
        let expected = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
        compare(out, &expected)?;
    }
    Ok(())
}

fn compare(actual: &[u8], expected: &[u8]) -> anyhow::Result<()> {
    if actual.len() != expected.len() {
        anyhow::bail!(
            "output is {} bytes, reference is {}",
            actual.len(),
            expected.len()
        );
    }
    let words = actual.chunks(4).zip(expected.chunks(4));
    for (i, (a, e)) in words.enumerate() {
        if a != e {
            anyhow::bail!(
                "output mismatch at word {i}: expected {:02x?}, got {:02x?}",
                e,
                a
            );
        }
    }
    Ok(())
}

fn cmd_fill(v2d: &V2d, heaps: &mut HeapAllocator, args: FillArgs) -> anyhow::Result<()> {
    let format = ColorFormat::Rgba8888;
    let len = format.frame_len(u32::from(FRAME_W) * format.bytes_per_pixel(), FRAME_H.into());
    let out = alloc_frame(heaps, len, "destination")?;
    prepare(&out, 0x80, None)?;

    let job = v2d.begin_job();
    v2d.add_fill_task(
        job,
        &FillParams {
            dst: Surface::packed(out.raw_fd(), FRAME_W, FRAME_H, format),
            dst_rect: Area::new(32, 32, 210, 180),
            color: FillColor::rgba8888(args.color),
        },
    )?;
    v2d.end_job(job).context("fill job")?;

    finish(&out, len, &args.case)?;
    eprintln!("fill ok");
    Ok(())
}

fn cmd_blit(v2d: &V2d, heaps: &mut HeapAllocator, args: CaseArgs) -> anyhow::Result<()> {
    let format = ColorFormat::Rgba8888;
    let len = format.frame_len(u32::from(FRAME_W) * format.bytes_per_pixel(), FRAME_H.into());
    let src = alloc_frame(heaps, len, "source")?;
    let out = alloc_frame(heaps, len, "destination")?;
    prepare(&src, 0, args.input.as_deref())?;
    prepare(&out, 0x80, None)?;

    let job = v2d.begin_job();
    v2d.add_bitblit_task(
        job,
        &BitblitParams {
            dst: Surface::packed(out.raw_fd(), FRAME_W, FRAME_H, format),
            dst_rect: Area::new(64, 32, 200, 180),
            src: Surface::packed(src.raw_fd(), FRAME_W, FRAME_H, format),
            src_rect: Area::new(53, 37, 200, 180),
            csc: CscMode::None,
        },
    )?;
    v2d.end_job(job).context("blit job")?;

    finish(&out, len, &args)?;
    eprintln!("blit ok");
    Ok(())
}

fn cmd_blend(v2d: &V2d, heaps: &mut HeapAllocator, args: CaseArgs) -> anyhow::Result<()> {
    let format = ColorFormat::Nv12;
    let len = format.frame_len(FRAME_W.into(), FRAME_H.into());
    let src = alloc_frame(heaps, len, "layer")?;
    let out = alloc_frame(heaps, len, "destination")?;
    prepare(&src, 0, args.input.as_deref())?;
    prepare(&out, 0, None)?;

    let area = Area::full(FRAME_W, FRAME_H);
    let job = v2d.begin_job();
    v2d.add_blend_task(
        job,
        &BlendParams {
            background: Some(Surface::packed(src.raw_fd(), FRAME_W, FRAME_H, format)),
            background_rect: Some(area),
            dst: Some(Surface::packed(out.raw_fd(), FRAME_W, FRAME_H, format)),
            dst_rect: Some(area),
            blend: Some(BlendConf::single_layer(area)),
            ..BlendParams::default()
        },
    )?;
    v2d.end_job(job).context("blend job")?;

    finish(&out, len, &args)?;
    eprintln!("blend ok");
    Ok(())
}

fn cmd_run(v2d: &V2d, heaps: &mut HeapAllocator, args: RunArgs) -> anyhow::Result<()> {
    let plan = JobPlan::from_path(&args.plan)?;
    plan.validate()
        .with_context(|| format!("invalid plan '{}'", args.plan.display()))?;

    let base = args.plan.parent().unwrap_or_else(|| Path::new("."));
    let mut bufs: BTreeMap<&str, DmaBuf> = BTreeMap::new();
    for (name, spec) in &plan.buffers {
        let len = page_align(spec.size);
        let buf = match &spec.heap {
            Some(heap) => heaps.alloc(heap, len),
            None => heaps.alloc_system(spec.cpu_access(name, &plan), len),
        }
        .with_context(|| format!("allocate buffer '{name}' ({len} bytes)"))?;

        if spec.fill.is_some() || spec.load.is_some() {
            let input = spec.load.as_ref().map(|p| base.join(p));
            prepare(&buf, spec.fill.unwrap_or(0), input.as_deref())
                .with_context(|| format!("prepare buffer '{name}'"))?;
        }
        bufs.insert(name.as_str(), buf);
    }

    let job = plan.build_job(&|name| bufs.get(name).map(DmaBuf::raw_fd))?;
    let stats = v2d
        .submit(job)
        .with_context(|| format!("run plan '{}'", args.plan.display()))?;
    tracing::info!(
        tasks = stats.tasks_written,
        signaled = stats.fences.signaled,
        "plan complete"
    );

    for (name, path) in &plan.dump {
        let Some(buf) = bufs.get(name.as_str()) else {
            continue;
        };
        let map = buf.map().with_context(|| format!("map buffer '{name}'"))?;
        let len = plan.buffers[name].size.min(buf.len());
        let path = base.join(path);
        std::fs::write(&path, &map[..len]).with_context(|| format!("write '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../../tests/unit/bin/main.rs"]
mod tests;
