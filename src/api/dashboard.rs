//! Server-rendered HTML dashboard
//!
//! `templates/dashboard.html` renders the status snapshot and the daily
//! rollups. Charts are drawn client-side by Chart.js from data embedded in
//! the page.

use askama::Template;
use serde_json::json;

use crate::aggregate::StatusSnapshot;
use crate::history::DailyRollup;

const CHART_JS_CDN: &str = "https://cdn.jsdelivr.net/npm/chart.js@4.4.1/dist/chart.umd.min.js";

/// One line of the endpoint table
pub struct EndpointRow {
    pub endpoint: String,
    pub class: &'static str,
    pub label: &'static str,
    pub status: u16,
    pub elapsed_ms: u64,
    pub error: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub status: StatusSnapshot,
    pub rows: Vec<EndpointRow>,
    /// Rendered unescaped inside `<script>`; built by `script_json`
    pub chart_json: String,
    pub base_url: String,
    pub last_check: String,
    pub uptime_class: &'static str,
    pub chart_js_cdn: &'static str,
}

impl DashboardTemplate {
    pub fn new(status: StatusSnapshot, daily: &[DailyRollup], base_url: &str) -> Self {
        let rows = status
            .endpoints
            .iter()
            .map(|(endpoint, check)| {
                let (class, label) = if check.success { ("good", "UP") } else { ("bad", "DOWN") };
                EndpointRow {
                    endpoint: endpoint.clone(),
                    class,
                    label,
                    status: check.status,
                    elapsed_ms: check.elapsed_ms,
                    error: check.error.clone().unwrap_or_default(),
                }
            })
            .collect();

        let last_check = status
            .last_check
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        Self {
            uptime_class: uptime_class(&status.uptime),
            rows,
            chart_json: script_json(&chart_data(daily)),
            base_url: base_url.to_string(),
            last_check,
            chart_js_cdn: CHART_JS_CDN,
            status,
        }
    }
}

fn uptime_class(uptime: &str) -> &'static str {
    match uptime.parse::<f64>() {
        Ok(u) if u >= 99.0 => "good",
        Ok(u) if u >= 95.0 => "warn",
        _ => "bad",
    }
}

/// JSON safe to embed inside a `<script>` element
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn chart_data(daily: &[DailyRollup]) -> serde_json::Value {
    let labels: Vec<String> = daily.iter().map(|d| d.date.format("%Y-%m-%d").to_string()).collect();

    let mut endpoint_names: Vec<&String> = daily.iter().flat_map(|d| d.endpoints.keys()).collect();
    endpoint_names.sort();
    endpoint_names.dedup();

    let per_endpoint: Vec<serde_json::Value> = endpoint_names
        .iter()
        .map(|name| {
            let data: Vec<Option<u64>> = daily
                .iter()
                .map(|d| d.endpoints.get(*name).map(|e| e.avg_elapsed_ms))
                .collect();
            json!({ "label": name, "data": data })
        })
        .collect();

    json!({
        "labels": labels,
        "avg": daily.iter().map(|d| d.avg_elapsed_ms).collect::<Vec<_>>(),
        "max": daily.iter().map(|d| d.max_elapsed_ms).collect::<Vec<_>>(),
        "min": daily.iter().map(|d| d.min_elapsed_ms).collect::<Vec<_>>(),
        "errorRate": daily.iter().map(|d| d.error_rate).collect::<Vec<_>>(),
        "endpoints": per_endpoint,
    })
}
