// tests/extract_filing.rs

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::json;
use sctscraper::locate::LocatorKind;
use sctscraper::{combine_filings, extract_filing, ExtractConfig, FilingMeta, Outcome};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sctscraper=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Proxy excerpt: a layout wrapper, an unrelated financial table, a caption
/// row above the header, a stacked two-year row, a continuation row holding
/// the title and a split currency column under "Total".
const PROXY_2007: &str = r#"<html><body>
<table><tr><td>
  <table><tr><td>Proxy Statement</td><td>Page 14</td></tr></table>
</td></tr></table>
<p>Selected financial data</p>
<table>
  <tr><td>Fiscal Year</td><td>Revenue</td><td>Net income</td></tr>
  <tr><td>2006</td><td>$12,000,000</td><td>$1,100,000</td></tr>
</table>
<p align="center"><b>SUMMARY COMPENSATION TABLE</b></p>
<table>
  <tr><td></td><td></td><td colspan="2">Annual Compensation</td><td></td><td colspan="2"></td></tr>
  <tr>
    <td>Name and Principal Position</td><td>Year</td><td>Salary ($)(1)</td><td>Bonus ($)</td>
    <td>All Other Compensation ($)</td><td colspan="2">Total ($)</td>
  </tr>
  <tr>
    <td>John A. Smith</td><td>2006<br>2005</td><td>500,000<br>450,000</td><td>100,000<br>&mdash;</td>
    <td>12,000<br>11,000</td><td>$</td><td>612,000<br>461,000</td>
  </tr>
  <tr><td>Chief Executive Officer</td><td></td><td></td><td></td><td></td><td></td><td></td></tr>
  <tr>
    <td>Mary Jones</td><td>2006</td><td>$ 300,000</td><td>50,000</td>
    <td>8,000</td><td>$</td><td>358,000</td>
  </tr>
  <tr>
    <td>Chief Financial Officer</td><td>2005</td><td>280,000</td><td>&mdash;</td>
    <td>7,500</td><td>$</td><td>287,500</td>
  </tr>
</table>
<p>(1) Includes amounts deferred under the 401(k) plan.</p>
</body></html>"#;

fn meta(date: &str) -> FilingMeta {
    FilingMeta {
        ticker: "acme".into(),
        report_date: date.into(),
        report_year: None,
    }
}

#[test]
fn proxy_table_becomes_a_nested_record() -> Result<()> {
    init_test_logging();
    let out = extract_filing(PROXY_2007.as_bytes(), &meta("2007-03-30"), &ExtractConfig::default());

    assert_eq!(out.outcome, Outcome::Extracted { executives: 2 });
    let candidate = out.candidate.as_ref().expect("candidate summary");
    assert_eq!(candidate.strategy, LocatorKind::Scored);
    // the wrapper counts as table 0 and its inner table as table 1
    assert_eq!(candidate.table_index, 3);
    assert!(out.diagnostics.is_empty(), "diagnostics: {:?}", out.diagnostics);

    let value = serde_json::to_value(&out.record)?;
    assert_eq!(
        value,
        json!({
            "company": {
                "ticker": "ACME",
                "report_year": "2007",
                "summary_compensation_table": [{
                    "report_date": "2007-03-30",
                    "executives": {
                        "John A. Smith | Chief Executive Officer": {
                            "2005": {
                                "position": "Chief Executive Officer",
                                "salary": 450000,
                                "bonus": 0,
                                "all_other_compensation": 11000,
                                "total": 461000
                            },
                            "2006": {
                                "position": "Chief Executive Officer",
                                "salary": 500000,
                                "bonus": 100000,
                                "all_other_compensation": 12000,
                                "total": 612000
                            }
                        },
                        "Mary Jones | Chief Financial Officer": {
                            "2005": {
                                "position": "Chief Financial Officer",
                                "salary": 280000,
                                "bonus": null,
                                "all_other_compensation": 7500,
                                "total": 287500
                            },
                            "2006": {
                                "position": "Chief Financial Officer",
                                "salary": 300000,
                                "bonus": 50000,
                                "all_other_compensation": 8000,
                                "total": 358000
                            }
                        }
                    }
                }]
            }
        })
    );
    Ok(())
}

#[test]
fn filing_without_a_table_is_empty_not_an_error() -> Result<()> {
    init_test_logging();
    let html = "<html><body><p>Annual report.</p><p>The company had a good year.</p></body></html>";
    let out = extract_filing(html.as_bytes(), &meta("2007-03-30"), &ExtractConfig::default());

    assert_eq!(out.outcome, Outcome::NoCandidateFound);
    assert!(out.candidate.is_none());
    assert!(out.narrative.is_none());
    assert_eq!(
        serde_json::to_value(&out.record)?["company"]["summary_compensation_table"][0]["executives"],
        json!({})
    );
    Ok(())
}

#[test]
fn yaml_config_threshold_can_reject_every_table() -> Result<()> {
    init_test_logging();
    let cfg = ExtractConfig::from_yaml_str(
        "strategies: [scored]\nmin_candidate_score: 1000\nnarrative_fallback: false\n",
    )?;
    let out = extract_filing(PROXY_2007.as_bytes(), &meta("2007-03-30"), &cfg);
    assert_eq!(out.outcome, Outcome::NoCandidateFound);
    assert!(out.narrative.is_none());
    Ok(())
}

#[test]
fn filings_of_one_ticker_combine_by_report_date() {
    init_test_logging();
    let cfg = ExtractConfig::default();
    let first = extract_filing(PROXY_2007.as_bytes(), &meta("2007-03-30"), &cfg).record;
    let second = extract_filing(PROXY_2007.as_bytes(), &meta("20080328"), &cfg).record;

    let combined = combine_filings(&[second, first]).expect("combined record");
    assert_eq!(combined.ticker, "ACME");
    assert_eq!(combined.report_years, vec!["2007", "2008"]);
    assert_eq!(
        combined.summary_compensation_table.keys().collect::<Vec<_>>(),
        vec!["2007-03-30", "20080328"]
    );
}
