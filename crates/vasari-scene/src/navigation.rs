//! Content navigation: path parsing, peer resolution, composition into the
//! chrome template, and history.
//!
//! A path names content as `namespace:kind:name`, e.g.
//! `@exactchange:page:featured`. The namespace is looked up in the peer
//! table (with or without its leading `@`) to find a base, and the content
//! lives at `<base>/<kind>/<name>.<ext>`. Fetches run on the content
//! service; [`Navigator::complete`] turns a finished fetch into a document.

use crate::attributes::{AttributeValue, Attributes};
use crate::error::NavigationError;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use vasari_io::{to_data_uri, ContentResult, ContentService, ContentSource};

/// Placeholder in the chrome template replaced by the content root view.
pub const ROOT_PLACEHOLDER: &str = "<%ROOT%>";

/// Height of the chrome bar above the content root.
pub const CHROME_HEIGHT: u32 = 40;

/// Browser chrome: back/home/exit buttons and the search input.
pub const CHROME_TEMPLATE: &str = r##"<App>
  <Declare id="session" search="" />
  <View id="chrome" x={0} y={0} height={40} style="#0b0b10">
    <Rect id="back" fill x={0} y={2} width={36} height={36} style="#00000060" click="handleClickBack">
      <Text text="←" x={13} y={22} size={11} maxWidth={24} style={linear-gradient(#80088090, #ff000050)} />
      <Rect fill x={0} y={35} width={36} height={1} style={linear-gradient(#80088090, #ff000050)} />
    </Rect>
    <Rect id="home" fill x={36} y={2} width={36} height={36} style="#80088020" click="handleClickHome">
      <Text text="⌂" x={11} y={23} size={15} maxWidth={24} style={linear-gradient(#80088090, #ff000050)} />
      <Rect fill x={0} y={35} width={36} height={1} style={linear-gradient(#80088090, #ff000050)} />
    </Rect>
    <Input id="search" fill x={72} y={2} width={916} height={36} style="#00000040" value="${search}" placeholder="Search apps & content..." />
    <Rect id="exit" fill x={988} y={2} width={36} height={36} style="#ff000010" click="handleClickExit">
      <Text text="✕" x={13} y={22} size={11} maxWidth={24} style={linear-gradient(#80088090, #ff000050)} />
      <Rect fill x={0} y={35} width={36} height={1} style={linear-gradient(#80088090, #ff000050)} />
    </Rect>
  </View>
  <%ROOT%>
  <Event id="handleClickBack">back</Event>
  <Event id="handleClickHome">navigate $home</Event>
  <Event id="handleClickExit">exit</Event>
</App>"##;

/// Kinds of navigable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    App,
    Audio,
    Data,
    Image,
    Page,
    Text,
    Video,
}

impl ContentKind {
    pub fn parse(kind: &str) -> Option<Self> {
        Some(match kind {
            "app" => ContentKind::App,
            "audio" => ContentKind::Audio,
            "data" => ContentKind::Data,
            "image" => ContentKind::Image,
            "page" => ContentKind::Page,
            "text" => ContentKind::Text,
            "video" => ContentKind::Video,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::App => "app",
            ContentKind::Audio => "audio",
            ContentKind::Data => "data",
            ContentKind::Image => "image",
            ContentKind::Page => "page",
            ContentKind::Text => "text",
            ContentKind::Video => "video",
        }
    }

    /// File extension content of this kind is stored under.
    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::App | ContentKind::Page => "jsx",
            ContentKind::Audio => "mp3",
            ContentKind::Data => "json",
            ContentKind::Image => "png",
            ContentKind::Text => "txt",
            ContentKind::Video => "mp4",
        }
    }
}

/// A parsed `namespace:kind:name` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPath {
    pub namespace: String,
    pub kind: ContentKind,
    pub name: String,
}

impl ContentPath {
    pub fn parse(path: &str) -> Result<Self, NavigationError> {
        let lower = path.trim().to_lowercase();
        let mut parts = lower.splitn(3, ':');
        let (Some(namespace), Some(kind), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(NavigationError::InvalidPath(path.to_string()));
        };
        if namespace.is_empty() || name.is_empty() {
            return Err(NavigationError::InvalidPath(path.to_string()));
        }
        let kind = ContentKind::parse(kind).ok_or_else(|| NavigationError::UnknownKind(kind.to_string()))?;
        Ok(Self {
            namespace: namespace.to_string(),
            kind,
            name: name.to_string(),
        })
    }

    /// Location relative to the peer base.
    pub fn relative(&self) -> String {
        format!("{}/{}.{}", self.kind.as_str(), self.name, self.kind.extension())
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.kind.as_str(), self.name)
    }
}

/// A composed page ready to become the current document.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub path: String,
    pub document: String,
}

struct InFlight {
    request_id: u64,
    path: ContentPath,
}

pub struct Navigator {
    peers: BTreeMap<String, String>,
    template: String,
    viewport: (u32, u32),
    history: Vec<String>,
    content: ContentService,
    in_flight: Option<InFlight>,
    next_request: u64,
}

impl Navigator {
    pub fn new(peers: BTreeMap<String, String>, viewport: (u32, u32)) -> Self {
        Self {
            peers,
            template: CHROME_TEMPLATE.to_string(),
            viewport,
            history: Vec::new(),
            content: ContentService::new(),
            in_flight: None,
            next_request: 1,
        }
    }

    /// Replace the chrome template. It must contain [`ROOT_PLACEHOLDER`].
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.content.set_default_timeout(timeout);
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn current(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub fn has_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The chrome with an empty content root, shown before anything loads.
    pub fn blank_document(&self) -> String {
        self.template.replace(ROOT_PLACEHOLDER, &self.root_view(""))
    }

    /// Resolve `path` and start fetching it. A request still in flight is
    /// cancelled.
    pub fn request(&mut self, path: &str) -> Result<(), NavigationError> {
        let parsed = ContentPath::parse(path)?;
        let base = self
            .peers
            .get(&parsed.namespace)
            .or_else(|| self.peers.get(parsed.namespace.trim_start_matches('@')))
            .ok_or_else(|| NavigationError::UnknownPeer(parsed.namespace.clone()))?;
        let source = ContentSource::resolve(base, &parsed.relative());

        if let Some(previous) = self.in_flight.take() {
            self.content.cancel(previous.request_id);
        }
        let request_id = self.next_request;
        self.next_request += 1;
        tracing::info!(path = %parsed, %source, "navigator: requesting");
        self.content.request(request_id, source);
        self.in_flight = Some(InFlight { request_id, path: parsed });
        Ok(())
    }

    /// Finished fetches, ready to hand to [`Navigator::complete`].
    pub fn poll(&mut self) -> Vec<ContentResult> {
        self.content.poll()
    }

    /// Block until the in-flight fetch finishes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Vec<ContentResult> {
        self.content.wait_all(timeout)
    }

    /// Turn a finished fetch into a document. Stale results yield `None`.
    /// On success the path is pushed onto the history.
    pub fn complete(&mut self, result: ContentResult) -> Option<Result<Loaded, NavigationError>> {
        if self.in_flight.as_ref()?.request_id != result.request_id {
            tracing::debug!(request_id = result.request_id, "navigator: dropping stale result");
            return None;
        }
        let in_flight = self.in_flight.take()?;
        let body = match result.body {
            Ok(body) => body,
            Err(err) => return Some(Err(NavigationError::Fetch(err))),
        };
        let path = in_flight.path.to_string();
        let document = self
            .template
            .replace(ROOT_PLACEHOLDER, &self.root_view(&compose(in_flight.path.kind, &body)));
        self.history.push(path.clone());
        tracing::info!(%path, "navigator: loaded");
        Some(Ok(Loaded { path, document }))
    }

    /// Drop the current entry and return the previous path, which the caller
    /// navigates to (pushing it again).
    pub fn back(&mut self) -> Option<String> {
        if self.history.len() < 2 {
            return None;
        }
        self.history.pop();
        self.history.pop()
    }

    fn root_view(&self, content: &str) -> String {
        let (width, height) = self.viewport;
        format!(
            r#"<View id="root" x={{0}} y={{{CHROME_HEIGHT}}} width={{{width}}} height={{{}}}>{content}</View>"#,
            height.saturating_sub(CHROME_HEIGHT)
        )
    }
}

/// Kind-specific markup for a fetched body.
pub fn compose(kind: ContentKind, body: &[u8]) -> String {
    match kind {
        ContentKind::Text => {
            let text = String::from_utf8_lossy(body);
            let mut out = String::new();
            for (line, content) in text.lines().enumerate() {
                let mut attrs = Attributes::new();
                attrs.insert("text", AttributeValue::Text(escape_interpolation(content)));
                attrs.insert("x", AttributeValue::Text("8".into()));
                attrs.insert("y", AttributeValue::Text(format!("{}", 20 + line * 18)));
                out.push_str(&format!("<Text {attrs} />"));
            }
            out
        }
        ContentKind::Data => {
            let text = String::from_utf8_lossy(body).replace(['\n', '\r'], "");
            let trimmed = text.trim();
            let list = trimmed
                .strip_prefix('{')
                .and_then(|t| t.strip_suffix('}'))
                .unwrap_or(trimmed);
            let mut attrs = Attributes::new();
            attrs.insert("x", AttributeValue::Text("8".into()));
            attrs.insert("y", AttributeValue::Text("20".into()));
            attrs.insert("list", AttributeValue::Text(escape_interpolation(list)));
            format!("<Data {attrs} />")
        }
        ContentKind::Image | ContentKind::Audio | ContentKind::Video => match to_data_uri(body) {
            Ok(uri) => {
                let tag = match kind {
                    ContentKind::Audio => "Audio",
                    ContentKind::Video => "Video",
                    _ => "Image",
                };
                format!(r#"<{tag} path="{uri}" />"#)
            }
            Err(err) => {
                tracing::warn!(%err, "navigator: Unknown file format.");
                r#"<Text text="Unknown file format." x={8} y={20} />"#.to_string()
            }
        },
        ContentKind::Page => {
            let mut tree = vasari_markup::parse(&String::from_utf8_lossy(body));
            let removed = tree.strip_elements(&["declare", "event"]);
            if removed > 0 {
                tracing::debug!(removed, "navigator: stripped script tags from page");
            }
            escape_interpolation(&tree.to_markup())
        }
        ContentKind::App => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Fetched content is displayed, not evaluated: `${` becomes the `$${`
/// escape so the embedding document's variables never leak into it.
fn escape_interpolation(text: &str) -> String {
    text.replace("${", "$${")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn peer_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("text")).unwrap();
        std::fs::write(dir.path().join("text/hello.txt"), "first line\nsecond").unwrap();
        dir
    }

    fn navigator(base: &Path) -> Navigator {
        let mut peers = BTreeMap::new();
        peers.insert("local".to_string(), base.display().to_string());
        Navigator::new(peers, (1024, 576))
    }

    #[test]
    fn paths_parse_and_lower_case() {
        let path = ContentPath::parse("@ExactChange:PAGE:Featured").unwrap();
        assert_eq!(path.namespace, "@exactchange");
        assert_eq!(path.kind, ContentKind::Page);
        assert_eq!(path.relative(), "page/featured.jsx");
        assert_eq!(path.to_string(), "@exactchange:page:featured");

        assert!(matches!(ContentPath::parse("nope"), Err(NavigationError::InvalidPath(_))));
        assert!(matches!(ContentPath::parse("a:movie:b"), Err(NavigationError::UnknownKind(_))));
        assert_eq!(ContentPath::parse("a:data:b").unwrap().relative(), "data/b.json");
    }

    #[test]
    fn unknown_peer_is_rejected() {
        let mut nav = Navigator::new(BTreeMap::new(), (100, 100));
        assert!(matches!(nav.request("x:text:y"), Err(NavigationError::UnknownPeer(_))));
        assert!(!nav.has_pending());
    }

    #[test]
    fn local_text_loads_into_the_chrome() {
        let dir = peer_dir();
        let mut nav = navigator(dir.path());
        nav.request("@local:text:hello").unwrap();
        let result = nav.wait(Duration::from_secs(5)).pop().unwrap();
        let loaded = nav.complete(result).unwrap().unwrap();

        assert_eq!(loaded.path, "@local:text:hello");
        assert!(loaded.document.contains(r#"<Text text="first line" x="8" y="20" />"#));
        assert!(loaded.document.contains(r#"<View id="root" x={0} y={40} width={1024} height={536}>"#));
        assert!(loaded.document.contains("handleClickBack"));
        assert!(!loaded.document.contains(ROOT_PLACEHOLDER));
        assert_eq!(nav.current(), Some("@local:text:hello"));
    }

    #[test]
    fn missing_content_is_a_fetch_error() {
        let dir = peer_dir();
        let mut nav = navigator(dir.path());
        nav.request("local:text:absent").unwrap();
        let result = nav.wait(Duration::from_secs(5)).pop().unwrap();
        let err = nav.complete(result).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "HTTP/404 Error fetching resource.");
        assert!(nav.history().is_empty());
    }

    #[test]
    fn back_pops_current_and_previous() {
        let mut nav = Navigator::new(BTreeMap::new(), (100, 100));
        assert_eq!(nav.back(), None);
        nav.history = vec!["a:text:1".into(), "a:text:2".into()];
        assert_eq!(nav.back().as_deref(), Some("a:text:1"));
        assert!(nav.history().is_empty());
    }

    #[test]
    fn compose_by_kind() {
        assert_eq!(
            compose(ContentKind::Data, b"{\n  \"a\": 1,\n  \"b\": true\n}"),
            r#"<Data x="8" y="20" list="  &quot;a&quot;: 1,  &quot;b&quot;: true" />"#
        );
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A];
        assert!(compose(ContentKind::Image, &png).starts_with(r#"<Image path="data:image/png;base64,"#));
        assert!(compose(ContentKind::Audio, &[0xFF, 0xFB, 0x90]).starts_with(r#"<Audio path="data:audio/mpeg;base64,"#));
        assert!(compose(ContentKind::Image, b"GIF89a").contains("Unknown file format."));

        let page = compose(
            ContentKind::Page,
            br#"<Page><Text text="hi" /><Event id="e">exit</Event><Declare id="d" /></Page>"#,
        );
        assert_eq!(page, r#"<Page><Text text="hi" /></Page>"#);
        assert_eq!(compose(ContentKind::App, b"<App><Event id=\"e\">exit</Event></App>"), "<App><Event id=\"e\">exit</Event></App>");
    }

    #[test]
    fn composed_lines_keep_quotes_and_placeholders_literal() {
        let markup = compose(ContentKind::Text, b"He said \"hello\nprice ${home} & more");
        let tree = vasari_markup::parse(&markup);
        let texts: Vec<String> = tree
            .elements()
            .filter_map(|node| node.value().as_element().cloned())
            .filter(|el| el.is("Text"))
            .filter_map(|el| crate::attributes::extract(&el.raw_attributes).text("text").map(str::to_string))
            .collect();
        assert_eq!(texts, vec![r#"He said "hello"#.to_string(), "price $${home} & more".to_string()]);

        let state = crate::script::ScriptState::default();
        let shown = crate::attributes::extract(&state.interpolate(r#"text="price $${home}""#));
        assert_eq!(shown.text("text"), Some("price ${home}"));
    }

    #[test]
    fn blank_document_has_an_empty_root() {
        let nav = Navigator::new(BTreeMap::new(), (800, 600));
        let doc = nav.blank_document();
        assert!(doc.contains(r#"<View id="root" x={0} y={40} width={800} height={560}></View>"#));
    }
}
