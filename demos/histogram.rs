use distinct_histogram::{CardinalityTracker, DistinctHistogram, FacetConfig, Order, Stats, TimeZoneRounding};

fn main() -> distinct_histogram::Result<()> {
    let config = FacetConfig::builder(TimeZoneRounding::parse("hour", "+02:00")?)
        .exact_threshold(50)
        .bucket_order(Order::DistinctDesc)
        .build()?;

    // two shards see overlapping users over the same three hours
    let shards: Vec<Vec<u8>> = (0..2i64)
        .map(|shard| {
            let mut collector = config.collector::<Stats<CardinalityTracker>>()?;
            for i in 0..3_000i64 {
                let timestamp = i * 3_600 + shard * 1_000;
                let user = format!("user-{}", (i + shard * 500) % (10 + i / 100));
                collector.collect(timestamp, Some(user.as_str().into()), None);
            }
            Ok(collector.encode())
        })
        .collect::<distinct_histogram::Result<_>>()?;

    for (i, bytes) in shards.iter().enumerate() {
        println!("shard {i} sent {} bytes", bytes.len());
    }

    let reduced: Option<DistinctHistogram> = config.reduce_encoded(&shards)?;
    for record in config.render(&reduced.unwrap_or_else(|| DistinctHistogram::new(50))) {
        println!(
            "{} total = {} distinct = {}",
            record.time,
            record.total_count,
            record.distinct_count.unwrap_or_default()
        );
    }
    Ok(())
}
