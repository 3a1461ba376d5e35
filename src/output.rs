use crate::model::{Task, ARCHIVE_COLUMN};

pub fn format_task_detail(task: &Task) -> String {
    let mut out = String::new();
    out.push_str(&format!("Id:          {}\n", task.id));
    out.push_str(&format!("Title:       {}\n", task.title));
    out.push_str(&format!("Column:      {} (#{})\n", task.column_id, task.position));
    if !task.description.is_empty() {
        out.push_str(&format!("Description: {}\n", indent_continuation(&task.description)));
    }
    if !task.followup.is_empty() {
        out.push_str(&format!("Follow-up:   {}\n", indent_continuation(&task.followup)));
    }
    out.push_str(&format!("Created:     {}\n", task.created_at));
    out.push_str(&format!("Updated:     {}\n", task.updated_at));
    out
}

/// Multi-line text lined up under the first line of a detail field.
fn indent_continuation(text: &str) -> String {
    text.trim_end().replace('\n', "\n             ")
}

/// One line per task: id, title, and a marker when it has a follow-up.
pub fn format_task_list(tasks: &[&Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        let followup = if task.followup.is_empty() { "" } else { "  [follow-up]" };
        out.push_str(&format!("{:>4}  {}{}\n", task.id, task.title, followup));
    }
    out
}

/// Every column as a heading followed by its tasks in order. Empty columns
/// are listed so the board shape is visible.
pub fn format_board(columns: &[(String, Vec<&Task>)]) -> String {
    let mut out = String::new();
    for (i, (column, tasks)) in columns.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let heading = if column == ARCHIVE_COLUMN {
            format!("{column} (archived)")
        } else {
            column.clone()
        };
        out.push_str(&format!("{heading} ({})\n", tasks.len()));
        out.push_str(&format_task_list(tasks));
    }
    out
}
