use anyhow::Result;
use queue_latency_bench::{
    benchmark::{ConsumerConfig, ConsumerRunner, ProducerConfig, ProducerRunner},
    samples::read_samples,
    BrokerServer, QueueClient,
};
use std::time::Duration;
use tempfile::TempDir;

async fn start_broker() -> Result<String> {
    let server = BrokerServer::bind("127.0.0.1:0").await?;
    let addr = server.local_addr().to_string();
    tokio::spawn(server.run());
    Ok(addr)
}

/// Push on one connection, pull on another, then see the queue drained.
#[tokio::test]
async fn push_and_pull_across_connections() -> Result<()> {
    let addr = start_broker().await?;

    let mut first = QueueClient::connect(&addr).await?;
    let mut second = QueueClient::connect(&addr).await?;

    first.push("42").await?;
    assert_eq!(second.pull().await?, Some("42".to_string()));
    assert_eq!(second.pull().await?, None);
    Ok(())
}

#[tokio::test]
async fn pull_on_empty_queue_never_blocks() -> Result<()> {
    let addr = start_broker().await?;
    let mut client = QueueClient::connect(&addr).await?;

    for _ in 0..50 {
        let reply = tokio::time::timeout(Duration::from_secs(2), client.pull()).await??;
        assert_eq!(reply, None);
    }
    Ok(())
}

#[tokio::test]
async fn tokens_come_back_in_push_order() -> Result<()> {
    let addr = start_broker().await?;
    let tokens: Vec<String> = (0..500).map(|i| format!("token-{}", i)).collect();

    let mut pusher = QueueClient::connect(&addr).await?;
    for token in &tokens {
        pusher.push(token).await?;
    }

    // Alternate between two pulling connections; together they must see
    // every token once, in order.
    let mut pullers = [
        QueueClient::connect(&addr).await?,
        QueueClient::connect(&addr).await?,
    ];
    let mut received = Vec::new();
    for i in 0..tokens.len() {
        let token = pullers[i % 2].pull().await?;
        received.push(token.expect("queue drained early"));
    }

    assert_eq!(received, tokens);
    assert_eq!(pullers[0].pull().await?, None);
    Ok(())
}

#[tokio::test]
async fn concurrent_pushers_and_pullers_deliver_exactly_once() -> Result<()> {
    let addr = start_broker().await?;
    const PUSHERS: usize = 4;
    const PER_PUSHER: usize = 250;

    let mut handles = Vec::new();
    for p in 0..PUSHERS {
        let addr = addr.clone();
        handles.push(tokio::spawn(async move {
            let mut client = QueueClient::connect(&addr).await?;
            for i in 0..PER_PUSHER {
                client.push(&format!("{}:{}", p, i)).await?;
            }
            Ok::<_, anyhow::Error>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let mut pullers = Vec::new();
    for _ in 0..4 {
        let addr = addr.clone();
        pullers.push(tokio::spawn(async move {
            let mut client = QueueClient::connect(&addr).await?;
            let mut seen = Vec::new();
            while let Some(token) = client.pull().await? {
                seen.push(token);
            }
            Ok::<_, anyhow::Error>(seen)
        }));
    }

    let mut all = Vec::new();
    for puller in pullers {
        let seen = puller.await??;
        for p in 0..PUSHERS {
            let prefix = format!("{}:", p);
            let order: Vec<usize> = seen
                .iter()
                .filter_map(|t| t.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert!(order.windows(2).all(|w| w[0] < w[1]));
        }
        all.extend(seen);
    }

    assert_eq!(all.len(), PUSHERS * PER_PUSHER);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), PUSHERS * PER_PUSHER);
    Ok(())
}

/// Producer and consumer roles against a live broker produce a sample file.
#[tokio::test]
async fn producer_and_consumer_record_samples() -> Result<()> {
    let addr = start_broker().await?;
    let dir = TempDir::new()?;
    let output = dir.path().join("simplified").join("test_1.txt");

    let consumer = ConsumerRunner::new(ConsumerConfig {
        addr: addr.clone(),
        msg_count: 64,
        output: output.clone(),
        backoff: Duration::from_micros(100),
        buffer_size: 8192,
    });
    let consumer = tokio::spawn(async move { consumer.run().await });

    let producer = ProducerRunner::new(ProducerConfig {
        addr,
        msg_count: 64,
        buffer_size: 8192,
    });
    let published = producer.run().await?;
    assert_eq!(published.published, 64);

    let summary = tokio::time::timeout(Duration::from_secs(10), consumer).await???;
    assert_eq!(summary.received, 64);
    assert_eq!(summary.skipped_tokens, 0);

    let set = read_samples(&output)?;
    assert_eq!(set.samples.len(), 64);
    assert!(set.invalid_lines.is_empty());
    Ok(())
}
