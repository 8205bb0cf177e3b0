//! Conversation page
//!
//! Rendered on the server from the session on every request. The page
//! records with the browser's `MediaRecorder`, posts the take to
//! `/api/turn` and reloads; reply audio is fetched from `/api/audio`,
//! which hands it out only once. While a turn runs the page polls
//! `/api/state` for the stage label.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{Router, extract::State, response::Html, routing::get};

use super::ApiState;
use crate::conversation::Role;
use crate::prompt::DEFAULT_NAME;
use crate::session::Session;

/// Build page router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/", get(index)).with_state(state)
}

async fn index(State(state): State<Arc<ApiState>>) -> Html<String> {
    let documents = state.documents();
    let name = documents.persona.first_name().unwrap_or(DEFAULT_NAME);
    let session = state.session.lock().await;
    Html(render_page(name, &session))
}

/// Escape text for inclusion in HTML content and attribute values
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the full page for a session
#[must_use]
pub fn render_page(name: &str, session: &Session) -> String {
    let name = escape_html(name);
    let log = session.log();
    let latest = log.last_assistant_index();

    let mut turns = String::new();
    for (index, turn) in log.turns().iter().enumerate() {
        let speaker = match turn.role {
            Role::System => continue,
            Role::User => "You",
            Role::Assistant => name.as_str(),
        };
        let emphasis = if Some(index) == latest { " latest" } else { "" };
        let class = format!("turn {}{emphasis}", turn.role.as_str());
        let _ = writeln!(
            turns,
            r#"<div class="{class}"><span class="speaker">{speaker}</span><p>{}</p></div>"#,
            escape_html(&turn.content)
        );
    }

    let audio = if session.has_pending_audio() {
        r#"<audio id="reply" src="/api/audio" autoplay></audio>"#
    } else {
        ""
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Talk to {name}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }}
.turn {{ margin: 0.75rem 0; }}
.speaker {{ font-size: 0.8rem; color: #666; }}
.turn p {{ margin: 0.2rem 0; }}
.assistant p {{ color: #444; }}
.latest p {{ font-weight: 600; color: #000; }}
#status {{ color: #666; min-height: 1.5rem; }}
#notice {{ color: #b00; }}
</style>
</head>
<body>
<h1>Talk to {name}</h1>
<div id="log" data-generation="{generation}">
{turns}</div>
<p id="notice"></p>
<p id="status">Ready</p>
<button id="record">Record</button>
<button id="reset">New conversation</button>
{audio}
<script>
const notice = sessionStorage.getItem("notice");
if (notice) {{
  document.getElementById("notice").textContent = notice;
  sessionStorage.removeItem("notice");
}}
const status = document.getElementById("status");
const button = document.getElementById("record");
let recorder = null;
let chunks = [];

async function showStage() {{
  try {{
    const response = await fetch("/api/state");
    const body = await response.json();
    if (body.state !== "idle") {{
      status.textContent = body.label;
    }}
  }} catch (_) {{}}
}}

async function readJson(response) {{
  const type = response.headers.get("Content-Type") || "";
  if (type.includes("application/json")) {{
    return response.json();
  }}
  const text = await response.text();
  return {{ error: {{ message: text || response.statusText }} }};
}}

button.addEventListener("click", async () => {{
  if (recorder && recorder.state === "recording") {{
    recorder.stop();
    return;
  }}
  const stream = await navigator.mediaDevices.getUserMedia({{ audio: true }});
  recorder = new MediaRecorder(stream);
  chunks = [];
  recorder.ondataavailable = (e) => chunks.push(e.data);
  recorder.onstop = async () => {{
    stream.getTracks().forEach((t) => t.stop());
    button.disabled = true;
    status.textContent = "Working...";
    const blob = new Blob(chunks, {{ type: recorder.mimeType || "audio/webm" }});
    const poll = setInterval(showStage, 300);
    try {{
      const response = await fetch("/api/turn", {{
        method: "POST",
        headers: {{ "Content-Type": blob.type }},
        body: blob,
      }});
      const body = await readJson(response);
      if (body.error) {{
        sessionStorage.setItem("notice", body.error.message);
      }} else if (body.notice) {{
        sessionStorage.setItem("notice", body.notice.message);
      }}
    }} catch (err) {{
      sessionStorage.setItem("notice", "Request failed: " + err);
    }} finally {{
      clearInterval(poll);
      window.location.reload();
    }}
  }};
  recorder.start();
  status.textContent = "Listening...";
  button.textContent = "Stop";
}});

document.getElementById("reset").addEventListener("click", async () => {{
  await fetch("/api/session/reset", {{ method: "POST" }});
  window.location.reload();
}});
</script>
</body>
</html>
"#,
        generation = session.generation(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn only_latest_reply_is_emphasized() {
        let mut session = Session::new("secret system prompt");
        session.log_mut().push_user("one");
        session.log_mut().push_assistant("first reply");
        session.log_mut().push_user("two");
        session.log_mut().push_assistant("second reply");

        let html = render_page("Dan", &session);
        assert_eq!(html.matches("turn assistant latest").count(), 1);
        let latest = html.find("turn assistant latest").unwrap();
        assert!(html[latest..].contains("second reply"));
        assert!(!html.contains("secret system prompt"));
        assert!(html.contains("<title>Talk to Dan</title>"));
    }

    #[test]
    fn turn_content_is_escaped() {
        let mut session = Session::new("sys");
        session.log_mut().push_user("<script>alert(1)</script>");
        let html = render_page("Dan", &session);
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)"));
    }

    #[test]
    fn audio_element_only_when_pending() {
        let mut session = Session::new("sys");
        assert!(!render_page("Dan", &session).contains("<audio"));

        session.set_pending_audio(crate::voice::SynthesizedAudio { bytes: vec![1, 2, 3] });
        assert!(
            render_page("Dan", &session)
                .contains(r#"<audio id="reply" src="/api/audio" autoplay>"#)
        );
    }

    #[test]
    fn script_polls_stage_and_tolerates_non_json_errors() {
        let html = render_page("Dan", &Session::new("sys"));
        assert!(html.contains(r#"fetch("/api/state")"#));
        assert!(html.contains("setInterval(showStage"));
        assert!(html.contains("clearInterval(poll)"));
        assert!(html.contains(r#"type.includes("application/json")"#));
    }

    #[test]
    fn turns_carry_role_classes() {
        let mut session = Session::new("sys");
        session.log_mut().push_user("hi");
        session.log_mut().push_assistant("hello");
        let html = render_page("Dan", &session);
        assert!(html.contains(r#"<div class="turn user">"#));
        assert!(html.contains(r#"<div class="turn assistant latest">"#));
    }
}
