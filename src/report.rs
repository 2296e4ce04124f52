//! Presentation of playthrough data
use crate::simulator::PlaythroughData;
use color_eyre::Result;
use horrorshow::helper::doctype;
use horrorshow::html;
use std::io::Write;
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

const STYLE: &str = "body { font-family: sans-serif; margin: 2em; } \
table { border-collapse: collapse; margin-bottom: 1.5em; } \
th, td { border: 1px solid #ccc; padding: 0.3em 0.8em; text-align: left; }";

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Renders the playthrough data of a story as a standalone HTML page
pub fn render_html(data: &PlaythroughData, story_title: &str) -> String {
    let metrics = vec![
        ("Playthroughs", data.total_playthroughs.to_string()),
        ("Coverage", percent(data.coverage)),
        ("Average path length", format!("{:.2}", data.average_path_length)),
        ("Branching factor", format!("{:.2}", data.branching_factor)),
        ("Player agency", format!("{:.2}", data.player_agency)),
        ("Dead ends", data.dead_ends.len().to_string()),
    ];

    format!(
        "{}",
        html! {
            : doctype::HTML;
            html {
                head {
                    title : format!("{} - playthrough report", story_title);
                    style : STYLE;
                }
                body {
                    h1 : story_title;
                    table(class = "metrics") {
                        @ for (name, value) in &metrics {
                            tr {
                                th : *name;
                                td : value.as_str();
                            }
                        }
                    }

                    h2 : "Most visited passages";
                    table(class = "visits") {
                        tr {
                            th : "Passage";
                            th : "Visits";
                            th : "Reached by";
                        }
                        @ for stat in &data.most_visited_passages {
                            tr {
                                td : stat.title.as_str();
                                td : stat.visits.to_string();
                                td : format!("{:.1}%", stat.percentage);
                            }
                        }
                    }

                    h2 : "Critical path";
                    ol(class = "critical-path") {
                        @ for id in &data.critical_path {
                            li : id.as_str();
                        }
                    }

                    h2 : "Dead ends";
                    ul(class = "dead-ends") {
                        @ for id in &data.dead_ends {
                            li : id.as_str();
                        }
                    }

                    h2 : "Never visited";
                    ul(class = "unvisited") {
                        @ for id in &data.unvisited_passages {
                            li : id.as_str();
                        }
                    }
                }
            }
        }
    )
}

fn heading(stdout: &mut StandardStream, text: &str) -> Result<()> {
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "{}", text)?;
    stdout.reset()?;
    Ok(())
}

/// Prints a short summary of the playthrough data
pub fn print_summary(data: &PlaythroughData, stdout: &mut StandardStream) -> Result<()> {
    heading(stdout, "Simulation: ")?;
    writeln!(
        stdout,
        "{} playthrough(s), {} coverage, average path length {:.2}",
        data.total_playthroughs,
        percent(data.coverage),
        data.average_path_length
    )?;

    heading(stdout, "Design: ")?;
    writeln!(
        stdout,
        "branching factor {:.2}, player agency {:.2}, {} dead end(s)",
        data.branching_factor,
        data.player_agency,
        data.dead_ends.len()
    )?;

    if !data.critical_path.is_empty() {
        heading(stdout, "Critical path: ")?;
        writeln!(stdout, "{}", data.critical_path.join(" -> "))?;
    }

    if !data.unvisited_passages.is_empty() {
        heading(stdout, "Never visited: ")?;
        writeln!(stdout, "{}", data.unvisited_passages.join(", "))?;
    }

    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::PassageVisitStat;

    #[test]
    fn html_report_lists_passages() {
        let data = PlaythroughData {
            total_playthroughs: 4,
            coverage: 0.75,
            average_path_length: 3.0,
            branching_factor: 1.5,
            player_agency: 0.5,
            most_visited_passages: vec![PassageVisitStat {
                passage_id: "start".to_string(),
                title: "The <Beginning>".to_string(),
                visits: 4,
                percentage: 100.0,
            }],
            critical_path: vec!["start".to_string(), "end".to_string()],
            dead_ends: vec!["end".to_string()],
            unvisited_passages: vec!["secret".to_string()],
        };

        let page = render_html(&data, "Cave");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<td>75.0%</td>"));
        assert!(page.contains("The &lt;Beginning&gt;"));
        assert!(page.contains("<li>secret</li>"));
    }
}
