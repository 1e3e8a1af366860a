use anyhow::Result;
use prism_client::{NodeStatus, SearchClient};

/// Run the health command: one `/health` call, then the per-node view it left behind.
pub async fn run_health(client: &SearchClient) -> Result<()> {
    let outcome = client.health().await;

    match &outcome {
        Ok(true) => println!("Cluster: ok"),
        Ok(false) => println!("Cluster: degraded"),
        Err(e) => println!("Cluster: unreachable ({})", e),
    }

    println!();
    println!("{:<40} {:<8} {:<10} {}", "NODE", "NEAREST", "HEALTHY", "DOWN FOR");
    for status in client.node_status() {
        println!("{}", format_status(&status));
    }

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => anyhow::bail!("cluster reported unhealthy"),
        Err(e) => Err(e.into()),
    }
}

fn format_status(status: &NodeStatus) -> String {
    let down_for = status
        .unhealthy_for
        .map(|d| format!("{:.1}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<40} {:<8} {:<10} {}",
        status.node,
        if status.nearest { "yes" } else { "no" },
        if status.healthy { "yes" } else { "no" },
        down_for
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_status() {
        let line = format_status(&NodeStatus {
            node: "http://a:3080".to_string(),
            nearest: false,
            healthy: false,
            unhealthy_for: Some(Duration::from_millis(1500)),
        });
        assert!(line.starts_with("http://a:3080"));
        assert!(line.ends_with("1.5s"));

        let line = format_status(&NodeStatus {
            node: "http://b:3080".to_string(),
            nearest: true,
            healthy: true,
            unhealthy_for: None,
        });
        assert!(line.ends_with('-'));
    }
}
