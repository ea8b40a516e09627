use quick_xml::escape::escape;

use crate::sources::twitch::Channel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    /// Byte length when known (estimated for transcodes), else 0.
    pub length: u64,
    pub mime: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// HTML fragment; escaped when written.
    pub description: String,
    pub guid: String,
    pub pub_date: String,
    pub duration: String,
    pub author: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub enclosure: Option<Enclosure>,
}

/// Channel-level values of the feed.
pub struct FeedHeader<'a> {
    pub channel: &'a Channel,
    /// Absolute URL of the feed itself.
    pub self_link: String,
}

impl FeedHeader<'_> {
    fn title(&self) -> String {
        format!("{}'s Twitch video RSS", self.channel.display_name)
    }

    fn description(&self) -> String {
        format!(
            "The RSS Feed of {}'s videos on Twitch",
            self.channel.display_name
        )
    }
}

fn element(xml: &mut String, name: &str, value: &str) {
    xml.push_str(&format!("<{name}>{}</{name}>", escape(value)));
}

pub fn render(header: &FeedHeader<'_>, items: &[FeedItem]) -> String {
    let channel = header.channel;
    let title = header.title();
    let description = header.description();
    let channel_link = format!("https://www.twitch.tv/{}", channel.login);

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(
        r#"<rss xmlns:atom="http://www.w3.org/2005/Atom" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" version="2.0">"#,
    );
    xml.push_str("<channel>");
    element(&mut xml, "title", &title);
    element(&mut xml, "link", &channel_link);
    element(&mut xml, "description", &description);
    xml.push_str(&format!(
        r#"<atom:link href="{}" rel="self" type="application/rss+xml"/>"#,
        escape(header.self_link.as_str())
    ));
    element(&mut xml, "generator", &format!("vodcast {}", crate::update::VERSION));

    if !channel.profile_image_url.is_empty() {
        xml.push_str("<image>");
        element(&mut xml, "url", &channel.profile_image_url);
        element(&mut xml, "title", &title);
        element(&mut xml, "link", &channel_link);
        xml.push_str("</image>");
        xml.push_str(&format!(
            r#"<itunes:image href="{}"/>"#,
            escape(channel.profile_image_url.as_str())
        ));
    }

    element(&mut xml, "itunes:author", "Twitch RSS Generated");
    element(&mut xml, "itunes:summary", &description);
    element(&mut xml, "itunes:explicit", "no");
    element(&mut xml, "itunes:complete", "no");

    for item in items {
        render_item(&mut xml, item);
    }

    xml.push_str("</channel></rss>");
    xml
}

fn render_item(xml: &mut String, item: &FeedItem) {
    xml.push_str("<item>");
    element(xml, "title", &item.title);
    element(xml, "link", &item.link);
    element(xml, "description", &item.description);
    xml.push_str(&format!(
        r#"<guid isPermaLink="false">{}</guid>"#,
        escape(item.guid.as_str())
    ));
    if let Some(category) = &item.category {
        element(xml, "category", category);
    }
    if let Some(enclosure) = &item.enclosure {
        xml.push_str(&format!(
            r#"<enclosure url="{}" length="{}" type="{}"/>"#,
            escape(enclosure.url.as_str()),
            enclosure.length,
            enclosure.mime
        ));
    }
    element(xml, "pubDate", &item.pub_date);
    element(xml, "itunes:author", &item.author);
    element(xml, "itunes:duration", &item.duration);
    if let Some(image) = &item.image {
        xml.push_str(&format!(r#"<itunes:image href="{}"/>"#, escape(image.as_str())));
    }
    xml.push_str("</item>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel {
            id: "42".into(),
            login: "teststreamer".into(),
            display_name: "Test & Co".into(),
            profile_image_url: "https://img.example/p.png".into(),
        }
    }

    fn item() -> FeedItem {
        FeedItem {
            title: "Run <1>".into(),
            link: "https://www.twitch.tv/videos/123".into(),
            description: r#"<a href="https://www.twitch.tv/videos/123">x</a>"#.into(),
            guid: "123".into(),
            pub_date: "Sun, 01 Jan 2023 00:00:00 +0000".into(),
            duration: "1:2:3".into(),
            author: "teststreamer".into(),
            image: None,
            category: None,
            enclosure: Some(Enclosure {
                url: "https://cdn.example/a.m3u8?x=1&y=2".into(),
                length: 0,
                mime: "audio/mpeg",
            }),
        }
    }

    #[test]
    fn renders_escaped_channel_and_items() {
        let ch = channel();
        let header = FeedHeader {
            channel: &ch,
            self_link: "http://localhost/vod/teststreamer".into(),
        };
        let xml = render(&header, &[item()]);

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<title>Test &amp; Co&apos;s Twitch video RSS</title>"));
        assert!(xml.contains("<title>Run &lt;1&gt;</title>"));
        assert!(xml.contains("&lt;a href=&quot;https://www.twitch.tv/videos/123&quot;&gt;"));
        assert!(xml.contains(r#"url="https://cdn.example/a.m3u8?x=1&amp;y=2""#));
        assert!(xml.contains("<itunes:duration>1:2:3</itunes:duration>"));
        assert!(xml.contains("<itunes:explicit>no</itunes:explicit>"));
        assert!(xml.ends_with("</channel></rss>"));
    }

    #[test]
    fn omits_missing_enclosure() {
        let ch = channel();
        let header = FeedHeader {
            channel: &ch,
            self_link: String::new(),
        };
        let mut bare = item();
        bare.enclosure = None;
        assert!(!render(&header, &[bare]).contains("<enclosure"));
    }
}
