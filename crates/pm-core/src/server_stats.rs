//! Per-domain instance data from the `status_xml` report.
//!
//! Only the shape the collector cares about is interpreted:
//!
//! ```text
//! <domain>
//!   <name>/var/www/app</name>
//!   <instances>
//!     <instance><pid>1234</pid><sessions>1</sessions>...</instance>
//!   </instances>
//! </domain>
//! ```
//!
//! Every `<instance>` below a `<domain>` becomes one map of its direct child
//! elements to their text. A domain is named by its `<name>` child, or by the
//! text directly inside `<domain>` when there is no `<name>`.

use crate::error::ReportError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use tracing::debug;

/// Child element name to text for one application instance.
pub type InstanceInfo = BTreeMap<String, String>;

/// Domain name to its instances, in document order.
pub type ServerStats = BTreeMap<String, Vec<InstanceInfo>>;

const DOMAIN_TAG: &str = "domain";
const NAME_TAG: &str = "name";
const INSTANCE_TAG: &str = "instance";

#[derive(Default)]
struct DomainBuilder {
    name: Option<String>,
    instances: Vec<InstanceInfo>,
}

/// Parse a `status_xml` document. An empty document yields no domains.
pub fn parse_server_stats(xml: &str) -> Result<ServerStats, ReportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stats = ServerStats::new();
    let mut path: Vec<String> = Vec::new();
    let mut domain: Option<DomainBuilder> = None;
    let mut instance: Option<InstanceInfo> = None;

    loop {
        let event = reader.read_event().map_err(|e| ReportError::Xml {
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if tag == DOMAIN_TAG {
                    domain = Some(DomainBuilder::default());
                } else if tag == INSTANCE_TAG && domain.is_some() {
                    instance = Some(InstanceInfo::new());
                }
                path.push(tag);
            }
            Event::Empty(empty) => {
                let tag = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                if let Some(fields) = instance.as_mut()
                    && parent_is(&path, INSTANCE_TAG)
                {
                    fields.insert(tag, String::new());
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| ReportError::Xml {
                        message: e.to_string(),
                    })?
                    .into_owned();
                record_text(&path, value, domain.as_mut(), instance.as_mut());
            }
            Event::End(_) => {
                let Some(tag) = path.pop() else {
                    continue;
                };
                if tag == INSTANCE_TAG
                    && let Some(fields) = instance.take()
                    && let Some(builder) = domain.as_mut()
                {
                    builder.instances.push(fields);
                } else if tag == DOMAIN_TAG
                    && let Some(builder) = domain.take()
                {
                    match builder.name {
                        Some(name) => {
                            stats.entry(name).or_default().extend(builder.instances);
                        }
                        None => debug!("Skipping status_xml domain without a name"),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stats)
}

/// Attach a text node to the element currently open at the top of `path`.
fn record_text(
    path: &[String],
    value: String,
    domain: Option<&mut DomainBuilder>,
    instance: Option<&mut InstanceInfo>,
) {
    let Some((current, ancestors)) = path.split_last() else {
        return;
    };

    if let Some(fields) = instance {
        if ancestors.last().map(String::as_str) == Some(INSTANCE_TAG) {
            fields.entry(current.clone()).or_default().push_str(&value);
        }
        return;
    }

    let Some(builder) = domain else {
        return;
    };
    let names_domain = current == DOMAIN_TAG
        || (current == NAME_TAG && ancestors.last().map(String::as_str) == Some(DOMAIN_TAG));
    if names_domain && builder.name.is_none() {
        builder.name = Some(value);
    }
}

fn parent_is(path: &[String], tag: &str) -> bool {
    path.last().map(String::as_str) == Some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="iso8859-1" ?>
<info>
  <domains>
    <domain>
      <name>/var/www/app</name>
      <instances>
        <instance>
          <pid>1234</pid>
          <sessions>1</sessions>
          <processed>42</processed>
        </instance>
        <instance>
          <pid>1240</pid>
          <sessions>0</sessions>
          <processed>7</processed>
        </instance>
      </instances>
    </domain>
    <domain>
      <name>/var/www/blog &amp; news</name>
      <instances>
        <instance><pid>2001</pid><status/></instance>
      </instances>
    </domain>
  </domains>
</info>"#;

    #[test]
    fn test_instances_grouped_by_domain() {
        let stats = parse_server_stats(REPORT).unwrap();
        assert_eq!(stats.len(), 2);

        let app = &stats["/var/www/app"];
        assert_eq!(app.len(), 2);
        assert_eq!(app[0]["pid"], "1234");
        assert_eq!(app[0]["processed"], "42");
        assert_eq!(app[1]["pid"], "1240");
        assert_eq!(app[1]["sessions"], "0");
    }

    #[test]
    fn test_escaped_names_and_empty_fields() {
        let stats = parse_server_stats(REPORT).unwrap();
        let blog = &stats["/var/www/blog & news"];
        assert_eq!(blog.len(), 1);
        assert_eq!(blog[0]["pid"], "2001");
        assert_eq!(blog[0]["status"], "");
    }

    #[test]
    fn test_domain_named_by_leading_text() {
        let stats =
            parse_server_stats("<domain>/srv/site<instance><pid>9</pid></instance></domain>")
                .unwrap();
        assert_eq!(stats["/srv/site"][0]["pid"], "9");
    }

    #[test]
    fn test_unnamed_domain_is_skipped() {
        let stats =
            parse_server_stats("<domain><instance><pid>9</pid></instance></domain>").unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn test_empty_document_has_no_domains() {
        assert!(parse_server_stats("").unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_tags_are_rejected() {
        let err = parse_server_stats("<info><domain></info>").unwrap_err();
        assert!(matches!(err, ReportError::Xml { .. }));
    }
}
