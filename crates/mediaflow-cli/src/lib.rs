use anyhow::{anyhow, bail, Result};
use mediaflow_core::{ObjectDescriptor, VariantResult};

/// Destination key template for uploaded variants.
///
/// Placeholders: `{name}` `{stem}` `{format}` `{width}` `{height}` `{key}`
/// `{key_stem}` `{bucket}` `{kind}`. Width and height render empty for audio.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Field),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Name,
    Stem,
    Format,
    Width,
    Height,
    Key,
    KeyStem,
    Bucket,
    Kind,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "name" => Field::Name,
            "stem" => Field::Stem,
            "format" => Field::Format,
            "width" => Field::Width,
            "height" => Field::Height,
            "key" => Field::Key,
            "key_stem" => Field::KeyStem,
            "bucket" => Field::Bucket,
            "kind" => Field::Kind,
            _ => return None,
        })
    }
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| anyhow!("Unclosed placeholder in path template: {}", template))?;
            let name = &after[..close];
            let field = Field::parse(name)
                .ok_or_else(|| anyhow!("Unknown placeholder {{{}}} in path template", name))?;
            segments.push(Segment::Field(field));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        if !segments.iter().any(|s| matches!(s, Segment::Field(Field::Name | Field::Stem))) {
            bail!("Path template must contain {{name}} or {{stem}} so variants get distinct keys");
        }
        Ok(Self { segments })
    }

    pub fn render(&self, descriptor: &ObjectDescriptor, variant: &VariantResult) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => match field {
                    Field::Name => out.push_str(&variant.name),
                    Field::Stem => out.push_str(
                        variant
                            .name
                            .rsplit_once('.')
                            .map(|(stem, _)| stem)
                            .unwrap_or(&variant.name),
                    ),
                    Field::Format => out.push_str(&variant.format),
                    Field::Width => {
                        if let Some(d) = variant.dimension {
                            out.push_str(&d.width.to_string());
                        }
                    }
                    Field::Height => {
                        if let Some(d) = variant.dimension {
                            out.push_str(&d.height.to_string());
                        }
                    }
                    Field::Key => out.push_str(&descriptor.key),
                    Field::KeyStem => out.push_str(descriptor.key_stem()),
                    Field::Bucket => out.push_str(&descriptor.bucket),
                    Field::Kind => out.push_str(&variant.kind.to_string()),
                },
            }
        }
        out
    }
}

/// Parse a `key=value` pair for `--meta`.
pub fn parse_meta(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("Expected key=value, got {:?}", pair),
    }
}

/// Initialize tracing for the binary. Logs go to stderr; stdout carries the notification.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mediaflow=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::Dimension;

    fn descriptor(dir: &tempfile::TempDir) -> ObjectDescriptor {
        ObjectDescriptor::new("uploads", "photos/cat.png", None, dir.path()).unwrap()
    }

    fn image() -> VariantResult {
        VariantResult::image(
            "abc-200_100.webp".to_string(),
            "webp".to_string(),
            10,
            Dimension::new(200, 100),
        )
    }

    #[test]
    fn test_render_all_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = PathTemplate::parse("{bucket}/{kind}/{key_stem}/{width}x{height}/{stem}.{format}")
            .unwrap();
        assert_eq!(
            t.render(&descriptor(&dir), &image()),
            "uploads/image/photos/cat/200x100/abc-200_100.webp"
        );

        let t = PathTemplate::parse("mirror/{key}-{name}").unwrap();
        assert_eq!(
            t.render(&descriptor(&dir), &image()),
            "mirror/photos/cat.png-abc-200_100.webp"
        );
    }

    #[test]
    fn test_audio_has_no_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let audio = VariantResult::audio("abc.mp3".to_string(), "mp3".to_string(), 5, Some(1.5));
        let t = PathTemplate::parse("a/{width}{name}").unwrap();
        assert_eq!(t.render(&descriptor(&dir), &audio), "a/abc.mp3");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(PathTemplate::parse("{nope}/{name}").is_err());
        assert!(PathTemplate::parse("out/{name").is_err());
        assert!(PathTemplate::parse("out/{key}").is_err());
    }

    #[test]
    fn test_parse_meta() {
        assert_eq!(
            parse_meta("source=upload=v2").unwrap(),
            ("source".to_string(), "upload=v2".to_string())
        );
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }
}
