//! Route command implementation.

use super::OutputFormat;
use segstore_server::SegmentToContainerMapper;
use serde::Serialize;

/// Where one segment name is routed.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Route {
    /// Segment name.
    pub segment: String,
    /// Owning container.
    pub container_id: u32,
}

/// Routing table for a set of names.
#[derive(Debug, Serialize)]
pub struct RouteResult {
    /// Container count used for the mapping.
    pub container_count: u32,
    /// One entry per requested name, in request order.
    pub routes: Vec<Route>,
}

/// Maps every name onto its container.
pub fn compute(names: &[String], containers: u32) -> Result<RouteResult, Box<dyn std::error::Error>> {
    let mapper = SegmentToContainerMapper::new(containers)?;
    let routes = names
        .iter()
        .map(|name| Route {
            segment: name.clone(),
            container_id: mapper.container_id(name),
        })
        .collect();

    Ok(RouteResult {
        container_count: mapper.container_count(),
        routes,
    })
}

/// Runs the route command.
pub fn run(names: &[String], containers: u32, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let result = compute(names, containers)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let width = result
                .routes
                .iter()
                .map(|r| r.segment.len())
                .max()
                .unwrap_or(0);
            for route in &result.routes {
                println!(
                    "{:<width$}  -> container {}",
                    route.segment,
                    route.container_id,
                    width = width
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_follow_the_mapper() {
        let names = vec!["abc".to_string(), "scope/stream/0".to_string()];
        let result = compute(&names, 4).unwrap();
        let mapper = SegmentToContainerMapper::new(4).unwrap();

        assert_eq!(result.container_count, 4);
        assert_eq!(result.routes.len(), 2);
        for route in &result.routes {
            assert_eq!(route.container_id, mapper.container_id(&route.segment));
        }
    }

    #[test]
    fn zero_containers_is_rejected() {
        assert!(compute(&["abc".to_string()], 0).is_err());
    }

    #[test]
    fn json_output_lists_routes() {
        let result = compute(&["abc".to_string()], 1).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["container_count"], 1);
        assert_eq!(json["routes"][0]["segment"], "abc");
        assert_eq!(json["routes"][0]["container_id"], 0);
    }
}
