//! `fgsm bounds`: where normalized pixels may live.

use fgsm::config::RunConfig;
use serde::Serialize;

use crate::error::Result;
use crate::output;

#[derive(Serialize)]
struct ChannelBounds {
    channel: usize,
    mean: f32,
    std: f32,
    min: f32,
    max: f32,
}

pub(crate) fn run(config: &RunConfig, json: bool) -> Result<()> {
    let normalization = config.normalization();
    let bounds = normalization.bounds();
    let rows: Vec<ChannelBounds> = bounds
        .per_channel()
        .into_iter()
        .enumerate()
        .map(|(channel, (min, max))| ChannelBounds {
            channel,
            mean: normalization.mean()[channel],
            std: normalization.std()[channel],
            min,
            max,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    output::section("Normalized Bounds");
    output::kv("Device", bounds.device());
    for row in &rows {
        output::kv(
            &format!("channel {}", row.channel),
            format!(
                "[{:.6}, {:.6}]  (mean {}, std {})",
                row.min, row.max, row.mean, row.std
            ),
        );
    }
    Ok(())
}
