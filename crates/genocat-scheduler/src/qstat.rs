//! Parsing of the `qstat -xml` active-queue snapshot.
//!
//! Only the `{job_list/JB_name, job_list/state}` pairs are needed, so a
//! small hand-rolled extractor is used instead of a full XML object model.

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::traits::ActiveJob;

/// Extract the active jobs from a `qstat -xml` document.
pub fn parse_active_jobs(xml: &str) -> CatalogResult<Vec<ActiveJob>> {
    let mut jobs = Vec::new();
    let mut rest = xml;

    while let Some(block) = next_element(&mut rest, "job_list")? {
        let name = text_of(block, "JB_name")?;
        let state = text_of(block, "state")?;
        jobs.push(ActiveJob { name, state });
    }
    Ok(jobs)
}

/// Advance `rest` past the next `<tag ...>...</tag>` element and return
/// its inner text, or `None` when the tag does not occur again.
fn next_element<'a>(rest: &mut &'a str, tag: &str) -> CatalogResult<Option<&'a str>> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let Some(start) = rest.find(&open) else {
        return Ok(None);
    };
    let after_open = &rest[start + open.len()..];
    let body_start = after_open.find('>').ok_or_else(|| {
        CatalogError::malformed(format!("Unterminated <{tag}> element in scheduler output"))
    })? + 1;
    let body = &after_open[body_start..];
    let end = body.find(&close).ok_or_else(|| {
        CatalogError::malformed(format!("Missing </{tag}> in scheduler output"))
    })?;

    let inner = &body[..end];
    *rest = &body[end + close.len()..];
    Ok(Some(inner))
}

/// Inner text of the first `<tag>...</tag>` child of a block.
fn text_of(block: &str, tag: &str) -> CatalogResult<String> {
    let mut rest = block;
    let inner = next_element(&mut rest, tag)?.ok_or_else(|| {
        CatalogError::malformed(format!("Missing <{tag}> in scheduler output"))
    })?;
    Ok(unescape(inner.trim()))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const QSTAT_XML: &str = r#"<?xml version='1.0'?>
<job_info>
  <queue_info>
    <job_list state="running">
      <JB_job_number>1097</JB_job_number>
      <JB_name>bwa_1001</JB_name>
      <state>r</state>
    </job_list>
  </queue_info>
  <job_info>
    <job_list state="pending">
      <JB_job_number>1098</JB_job_number>
      <JB_name>gatk_1002</JB_name>
      <state>qw</state>
    </job_list>
    <job_list state="pending">
      <JB_job_number>1099</JB_job_number>
      <JB_name>samtools_1003</JB_name>
      <state>Eqw</state>
    </job_list>
  </job_info>
</job_info>"#;

    #[test]
    fn test_parses_every_job_list_entry() {
        let jobs = parse_active_jobs(QSTAT_XML).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].name, "bwa_1001");
        assert_eq!(jobs[0].state, "r");
        assert_eq!(jobs[1].name, "gatk_1002");
        assert_eq!(jobs[1].state, "qw");
        assert_eq!(jobs[2].name, "samtools_1003");
        assert_eq!(jobs[2].state, "Eqw");
    }

    #[test]
    fn test_empty_queue_yields_no_jobs() {
        let jobs = parse_active_jobs("<job_info><queue_info/></job_info>").unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_job_list_without_name_is_malformed() {
        let xml = "<job_info><job_list><state>r</state></job_list></job_info>";
        assert!(parse_active_jobs(xml).is_err());
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = "<job_list><JB_name>a&amp;b_7</JB_name><state>r</state></job_list>";
        let jobs = parse_active_jobs(xml).unwrap();
        assert_eq!(jobs[0].name, "a&b_7");
    }
}
