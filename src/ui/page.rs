//! The single HTML page: header, gallery tab and chat tab.
//!
//! The transcript itself is drawn by the embedded script from the session
//! API, so message text only ever reaches the DOM through `textContent`.

use crate::core::constants::{
    APOLOGY, COMPLETION_ERROR_BANNER, HEADER_SUBTITLE, HEADER_TITLE, PAGE_TITLE,
    UNCONFIGURED_BANNER,
};
use crate::ui::escape_html;
use crate::ui::gallery::{render_gallery, CardItem};

/// Everything the page needs that is not a compile-time constant.
#[derive(Debug, Clone, Default)]
pub struct PageView<'a> {
    pub cards: &'a [CardItem],
    pub context_warnings: &'a [String],
    pub api_key_configured: bool,
    pub model: &'a str,
}

pub fn render_page(view: &PageView<'_>) -> String {
    format!(
        r#"<!doctype html>
<html lang="ko">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<div class="main-header">
  <div class="main-title">{header_title}</div>
  <div class="sub-title">{subtitle}</div>
</div>
<hr>
<div class="tabs">
  <button class="tab active" data-tab="gallery">💡 아이디어 갤러리</button>
  <button class="tab" data-tab="chat">💬 Gemini와 대화하기</button>
</div>
<section id="tab-gallery" class="tab-panel active">
{gallery}</section>
<section id="tab-chat" class="tab-panel">
{banners}  <div id="error-banner" class="banner banner-error" hidden></div>
  <div id="transcript" class="transcript"></div>
  <form id="composer" class="composer">
    <input id="input" type="text" autocomplete="off" placeholder="질문을 입력하세요...">
    <button id="send" type="submit">전송</button>
  </form>
  <div class="model-note">model: {model}</div>
</section>
<script>{script}</script>
</body>
</html>
"#,
        title = escape_html(PAGE_TITLE),
        style = STYLE,
        header_title = escape_html(HEADER_TITLE),
        subtitle = escape_html(HEADER_SUBTITLE),
        gallery = render_gallery(view.cards),
        banners = render_banners(view),
        model = escape_html(view.model),
        script = render_script(),
    )
}

fn render_banners(view: &PageView<'_>) -> String {
    let mut html = String::new();
    if !view.api_key_configured {
        html.push_str(&format!(
            "<div class=\"banner banner-error\">{}</div>\n",
            escape_html(UNCONFIGURED_BANNER)
        ));
    }
    for warning in view.context_warnings {
        html.push_str(&format!(
            "<div class=\"banner banner-warning\">{}</div>\n",
            escape_html(warning)
        ));
    }
    html
}

fn render_script() -> String {
    let js_string = |text: &str| serde_json::to_string(text).unwrap_or_else(|_| "\"\"".into());
    format!(
        "\nconst ERROR_TEXT = {};\nconst APOLOGY_TEXT = {};{SCRIPT}",
        js_string(COMPLETION_ERROR_BANNER),
        js_string(APOLOGY),
    )
}

const STYLE: &str = r#"
body { background-color: #f9fafb; font-family: -apple-system, "Apple SD Gothic Neo", "Noto Sans KR", sans-serif; margin: 0 auto; max-width: 1100px; padding: 0 24px 40px; color: #191f28; }
hr { border: none; border-top: 1px solid #e5e8eb; }
.main-header { display: flex; flex-direction: column; justify-content: center; align-items: center; padding: 40px 0; text-align: center; }
.main-title { font-size: 42px; font-weight: 800; margin: 0; }
.sub-title { font-size: 18px; color: #8b95a1; margin-top: 10px; }
.tabs { display: flex; gap: 8px; margin: 20px 0; }
.tab { border: none; background: #f2f4f6; color: #4e5968; padding: 10px 18px; border-radius: 10px; font-size: 15px; font-weight: 600; cursor: pointer; }
.tab.active { background: #3182f6; color: white; }
.tab-panel { display: none; }
.tab-panel.active { display: block; }
.card-grid { display: grid; grid-template-columns: repeat(2, 1fr); gap: 20px; }
@media (max-width: 720px) { .card-grid { grid-template-columns: 1fr; } }
.program-card { background-color: white; border-radius: 20px; padding: 24px; box-shadow: 0 4px 15px rgba(0,0,0,0.05); border: 1px solid #f0f0f0; transition: transform 0.2s; height: 320px; box-sizing: border-box; display: flex; flex-direction: column; justify-content: space-between; position: relative; }
.program-card:hover { transform: translateY(-5px); }
.card-content { flex: 1; }
.icon-box { font-size: 40px; position: absolute; top: 20px; right: 20px; filter: drop-shadow(0 2px 4px rgba(0,0,0,0.1)); }
.badge { display: inline-block; padding: 4px 10px; border-radius: 6px; font-size: 12px; font-weight: 600; background-color: #f2f4f6; color: #4e5968; margin-bottom: 10px; }
.card-title { font-size: 20px; font-weight: 700; margin-bottom: 8px; line-height: 1.4; padding-right: 50px; overflow: hidden; display: -webkit-box; -webkit-line-clamp: 2; -webkit-box-orient: vertical; }
.card-desc { font-size: 15px; color: #4e5968; line-height: 1.5; margin-top: 10px; overflow: hidden; display: -webkit-box; -webkit-line-clamp: 3; -webkit-box-orient: vertical; }
.action-btn { display: block; text-align: center; background-color: #e8f3ff; color: #1b64da; text-decoration: none; padding: 12px 0; border-radius: 12px; font-size: 15px; font-weight: 600; transition: 0.2s; margin-top: 15px; }
.action-btn:hover { background-color: #3182f6; color: white; }
.banner { padding: 12px 16px; border-radius: 10px; margin-bottom: 12px; font-size: 14px; }
.banner-warning { background: #fff8e1; color: #8a6d00; }
.banner-error { background: #ffebee; color: #c62828; }
.transcript { background: white; border: 1px solid #f0f0f0; border-radius: 16px; padding: 16px; height: 60vh; overflow-y: auto; }
.msg { display: flex; margin: 10px 0; }
.msg.user { justify-content: flex-end; }
.bubble { max-width: 75%; padding: 10px 14px; border-radius: 14px; line-height: 1.5; white-space: pre-wrap; word-break: break-word; }
.msg.user .bubble { background: #3182f6; color: white; }
.msg.assistant .bubble { background: #f2f4f6; }
.bubble.streaming::after { content: "▌"; animation: blink 1s steps(1) infinite; }
.bubble.partial { opacity: 0.6; }
@keyframes blink { 50% { opacity: 0; } }
.composer { display: flex; gap: 8px; margin-top: 12px; }
.composer input { flex: 1; padding: 12px 14px; font-size: 15px; border-radius: 12px; border: 1px solid #d1d6db; }
.composer button { padding: 0 20px; border: none; border-radius: 12px; background: #3182f6; color: white; font-weight: 600; cursor: pointer; }
.composer button:disabled { background: #b0b8c1; cursor: default; }
.model-note { color: #8b95a1; font-size: 12px; margin-top: 8px; text-align: right; }
"#;

const SCRIPT: &str = r#"
const SESSION_KEY = 'nobelforge_session';

const transcript = document.getElementById('transcript');
const composer = document.getElementById('composer');
const input = document.getElementById('input');
const sendButton = document.getElementById('send');
const errorBanner = document.getElementById('error-banner');
let sessionId = null;

document.querySelectorAll('.tab').forEach((tab) => {
  tab.addEventListener('click', () => {
    document.querySelectorAll('.tab').forEach((t) => t.classList.toggle('active', t === tab));
    document.querySelectorAll('.tab-panel').forEach((panel) => {
      panel.classList.toggle('active', panel.id === 'tab-' + tab.dataset.tab);
    });
    if (tab.dataset.tab === 'chat') { input.focus(); }
  });
});

function addMessage(role, text) {
  const row = document.createElement('div');
  row.className = 'msg ' + role;
  const bubble = document.createElement('div');
  bubble.className = 'bubble';
  bubble.textContent = text;
  row.appendChild(bubble);
  transcript.appendChild(row);
  transcript.scrollTop = transcript.scrollHeight;
  return bubble;
}

function showError(text) {
  errorBanner.textContent = text;
  errorBanner.hidden = false;
}

function setBusy(busy) {
  input.disabled = busy;
  sendButton.disabled = busy;
}

async function ensureSession() {
  const stored = sessionStorage.getItem(SESSION_KEY);
  if (stored) {
    const resp = await fetch('/api/sessions/' + encodeURIComponent(stored));
    if (resp.ok) { return resp.json(); }
  }
  const resp = await fetch('/api/sessions', { method: 'POST' });
  if (!resp.ok) { throw new Error('session creation failed: ' + resp.status); }
  const created = await resp.json();
  sessionStorage.setItem(SESSION_KEY, created.id);
  return created;
}

async function readEvents(resp, onEvent) {
  const reader = resp.body.getReader();
  const decoder = new TextDecoder();
  let buffer = '';
  let eventName = 'message';
  for (;;) {
    const { value, done } = await reader.read();
    if (done) { break; }
    buffer += decoder.decode(value, { stream: true });
    let idx;
    while ((idx = buffer.indexOf('\n')) >= 0) {
      const line = buffer.slice(0, idx).replace(/\r$/, '');
      buffer = buffer.slice(idx + 1);
      if (line === '') { eventName = 'message'; continue; }
      if (line.startsWith('event:')) { eventName = line.slice(6).trim(); continue; }
      if (line.startsWith('data:')) { onEvent(eventName, JSON.parse(line.slice(5).trim())); }
    }
  }
}

async function send(text) {
  errorBanner.hidden = true;
  setBusy(true);
  const userBubble = addMessage('user', text);
  const bubble = addMessage('assistant', '');
  bubble.classList.add('streaming');
  let assembled = '';
  let finished = false;
  try {
    const resp = await fetch('/api/sessions/' + encodeURIComponent(sessionId) + '/messages', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ text }),
    });
    if (!resp.ok) {
      const body = await resp.json().catch(() => ({}));
      userBubble.parentElement.remove();
      bubble.parentElement.remove();
      showError(body.message || ERROR_TEXT);
      return;
    }
    await readEvents(resp, (name, payload) => {
      if (name === 'chunk') {
        assembled += payload.text;
        bubble.textContent = assembled;
        transcript.scrollTop = transcript.scrollHeight;
      } else if (name === 'done') {
        finished = true;
        bubble.textContent = payload.reply.content;
      } else if (name === 'error') {
        finished = true;
        showError(payload.message);
        if (assembled) {
          bubble.classList.add('partial');
          addMessage('assistant', payload.reply.content);
        } else {
          bubble.textContent = payload.reply.content;
        }
      }
    });
    if (!finished) {
      showError(ERROR_TEXT);
      addMessage('assistant', APOLOGY_TEXT);
    }
  } catch (err) {
    showError(ERROR_TEXT);
    if (!assembled) { bubble.textContent = APOLOGY_TEXT; }
  } finally {
    bubble.classList.remove('streaming');
    setBusy(false);
    input.focus();
  }
}

composer.addEventListener('submit', (event) => {
  event.preventDefault();
  const text = input.value;
  if (!text.trim() || !sessionId) { return; }
  input.value = '';
  send(text);
});

ensureSession()
  .then((session) => {
    sessionId = session.id;
    transcript.replaceChildren();
    session.messages.forEach((m) => addMessage(m.role, m.content));
  })
  .catch(() => showError(ERROR_TEXT));
"#;
