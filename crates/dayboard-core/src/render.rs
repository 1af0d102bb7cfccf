use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::collision::Collisions;
use crate::config::Config;
use crate::datetime::format_timestamp;
use crate::task::{Project, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.ui.color,
        }
    }

    #[tracing::instrument(skip(self, tasks, projects))]
    pub fn print_task_table(
        &mut self,
        tasks: &[&Task],
        projects: &[Project],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = ["ID", "Status", "Due", "Project", "Title", "Tags", "Flags"]
            .map(String::from)
            .to_vec();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let due = task
                .due_date
                .map(|due| due.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let overdue = task
                .due_date
                .is_some_and(|due| due.date() < today && !task.status.is_done());
            let due = if overdue { self.paint(&due, "31") } else { due };

            let tags = task
                .tags
                .iter()
                .map(|tag| format!("+{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            rows.push(vec![
                self.paint(&task.id, "33"),
                task.status.as_str().to_string(),
                due,
                project_name(task, projects),
                task.title.clone(),
                tags,
                flags(task),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, projects))]
    pub fn print_task_info(&mut self, task: &Task, projects: &[Project]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id         {}", task.id)?;
        writeln!(out, "title      {}", task.title)?;
        writeln!(out, "status     {}", task.status.as_str())?;
        writeln!(out, "priority   {}", task.priority.as_str())?;
        writeln!(out, "project    {}", project_name(task, projects))?;
        if let Some(description) = &task.description {
            writeln!(out, "desc       {description}")?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due        {}", due.format("%Y-%m-%d %H:%M"))?;
        }
        if !task.tags.is_empty() {
            let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
            writeln!(out, "tags       {}", tags.join(", "))?;
        }
        writeln!(out, "flags      {}", flags(task))?;
        writeln!(out, "created    {}", format_timestamp(task.created_at))?;
        writeln!(out, "modified   {}", format_timestamp(task.updated_at))?;
        if let Some(completed) = task.completed_at {
            writeln!(out, "completed  {}", format_timestamp(completed))?;
        }

        Ok(())
    }

    pub fn print_projects(&mut self, projects: &[Project]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["ID".to_string(), "Name".to_string(), "Color".to_string()];
        let rows = projects
            .iter()
            .map(|project| {
                vec![
                    self.paint(&project.id, "33"),
                    project.name.clone(),
                    project.color.clone().unwrap_or_default(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    /// Winner first, then the rest of its group.
    pub fn print_collisions(&mut self, collisions: &Collisions) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["Target".to_string(), "Group".to_string(), "Score".to_string()];
        let rows = collisions
            .candidates()
            .enumerate()
            .map(|(idx, candidate)| {
                let id = candidate.target.to_string();
                vec![
                    if idx == 0 { self.paint(&id, "32") } else { id },
                    collisions.group.as_str().to_string(),
                    format!("{:.1}", candidate.score),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn print_json<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn print_line(&mut self, line: &str) -> anyhow::Result<()> {
        writeln!(io::stdout().lock(), "{line}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn project_name(task: &Task, projects: &[Project]) -> String {
    match task.project_id.as_deref() {
        None => String::new(),
        Some(id) => projects
            .iter()
            .find(|project| project.id == id)
            .map(|project| project.name.clone())
            // Dangling reference: the project is gone.
            .unwrap_or_else(|| format!("({id})")),
    }
}

fn flags(task: &Task) -> String {
    let mut flags = Vec::new();
    if task.starred {
        flags.push("starred");
    }
    if task.archived {
        flags.push("archived");
    }
    if task.deleted {
        flags.push("deleted");
    }
    flags.join(",")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(widths.iter().copied()) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(widths.iter().copied()) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{flags, project_name, strip_ansi, write_table};
    use crate::task::{Project, Task};

    #[test]
    fn columns_align_on_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33ma\x1b[0m".to_string(), "日本".to_string()],
                vec!["bbb".to_string(), "x".to_string()],
            ],
        )
        .expect("table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID  Title ");
        assert_eq!(lines[1], "--- ----- ");
        assert_eq!(strip_ansi(lines[2]), "a   日本  ");
        assert_eq!(lines[3], "bbb x     ");
    }

    #[test]
    fn dangling_project_refs_show_the_raw_id() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .expect("valid now");
        let mut task = Task::new_todo("t-1", "t", now);
        let projects = vec![Project {
            id: "p-1".to_string(),
            name: "Garden".to_string(),
            color: None,
            created_at: now,
            updated_at: now,
        }];

        assert_eq!(project_name(&task, &projects), "");
        task.project_id = Some("p-1".to_string());
        assert_eq!(project_name(&task, &projects), "Garden");
        task.project_id = Some("p-9".to_string());
        assert_eq!(project_name(&task, &projects), "(p-9)");

        task.starred = true;
        task.archived = true;
        assert_eq!(flags(&task), "starred,archived");
    }
}
