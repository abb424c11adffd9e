//! HTML dashboard controller.

use axum::response::Html;

/// Serves the dashboard page. It polls `/api/status` and renders the
/// summary cards, the job table, and the dead-letter table client-side.
pub async fn index() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

const DASHBOARD_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Queuectl Dashboard</title>
  <style>
    body { font-family: Arial, sans-serif; background: #f5f5f5; margin: 20px; }
    h1 { color: #333; }
    table { border-collapse: collapse; width: 100%; margin-top: 10px; background: white; }
    th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
    th { background-color: #007bff; color: white; }
    .summary { display: flex; gap: 15px; margin-bottom: 15px; }
    .card { background: white; padding: 10px 15px; border-radius: 8px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
  </style>
</head>
<body>
  <h1>Queuectl Dashboard</h1>
  <div id="summary" class="summary"></div>
  <h2>Jobs</h2>
  <table id="jobsTable">
    <thead><tr><th>ID</th><th>Command</th><th>State</th><th>Attempts</th><th>Updated</th></tr></thead>
    <tbody></tbody>
  </table>
  <h2>Dead Letter Queue</h2>
  <table id="dlqTable">
    <thead><tr><th>ID</th><th>Command</th><th>Error</th><th>Failed At</th></tr></thead>
    <tbody></tbody>
  </table>
  <script>
    async function loadData() {
      const res = await fetch('/api/status');
      const data = await res.json();

      document.getElementById('summary').innerHTML =
        Object.entries(data.status)
          .map(([k, v]) => `<div class='card'><b>${k}</b><br>${v}</div>`).join('');

      const jobsBody = document.querySelector('#jobsTable tbody');
      jobsBody.innerHTML = data.jobs.map(j =>
        `<tr><td>${j.id}</td><td>${j.command}</td><td>${j.state}</td><td>${j.attempts}</td><td>${j.updated_at}</td></tr>`
      ).join('');

      const dlqBody = document.querySelector('#dlqTable tbody');
      dlqBody.innerHTML = data.dead_letter.map(d =>
        `<tr><td>${d.job.id}</td><td>${d.job.command}</td><td>${d.job.last_error || 'N/A'}</td><td>${d.failed_at}</td></tr>`
      ).join('');
    }
    loadData();
    setInterval(loadData, 5000);
  </script>
</body>
</html>
"#;
