use crate::model::Task;

/// What a context-menu item does when invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Open,
    OpenWorkspace,
    Commit,
    Sync,
    Merge,
    Rebase,
    CopyBranch,
    Archive,
    Reset,
    Clean,
    Recover,
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub label: &'static str,
    pub action: MenuAction,
    pub enabled: bool,
}

impl MenuItem {
    fn new(label: &'static str, action: MenuAction, enabled: bool) -> Self {
        Self {
            label,
            action,
            enabled,
        }
    }
}

/// Host-dependent switches for menu construction
#[derive(Debug, Clone, Copy)]
pub struct MenuOptions {
    /// Whether this host exposes un-archiving at all
    pub expose_recover: bool,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            expose_recover: true,
        }
    }
}

/// Build the context menu for a task. Pure: the same task and options always
/// yield the same items; invocation side effects live with the caller.
pub fn build_menu(task: &Task, options: MenuOptions) -> Vec<MenuItem> {
    if task.is_archived() {
        let mut items = Vec::new();
        if options.expose_recover {
            items.push(MenuItem::new("Recover", MenuAction::Recover, true));
        }
        items.push(MenuItem::new("Delete", MenuAction::Clean, true));
        return items;
    }

    let broken = task.is_broken();
    vec![
        MenuItem::new("Open info", MenuAction::Open, true),
        MenuItem::new("Open workspace", MenuAction::OpenWorkspace, true),
        MenuItem::new("Commit changes", MenuAction::Commit, true),
        MenuItem::new("Sync with target", MenuAction::Sync, !broken),
        MenuItem::new("Merge into target", MenuAction::Merge, !broken),
        MenuItem::new("Change target branch", MenuAction::Rebase, !broken),
        MenuItem::new("Copy branch name", MenuAction::CopyBranch, true),
        MenuItem::new("Archive", MenuAction::Archive, !broken),
        MenuItem::new("Reset", MenuAction::Reset, true),
        MenuItem::new("Delete", MenuAction::Clean, true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::task;
    use crate::model::TaskStatus;

    #[test]
    fn test_archived_menu_is_minimal() {
        let t = task("t1", TaskStatus::Archived);
        let items = build_menu(&t, MenuOptions::default());

        let actions: Vec<MenuAction> = items.iter().map(|i| i.action).collect();
        assert_eq!(actions, vec![MenuAction::Recover, MenuAction::Clean]);
        assert!(items.iter().all(|i| i.enabled));
    }

    #[test]
    fn test_archived_menu_without_recover_host() {
        let t = task("t1", TaskStatus::Archived);
        let items = build_menu(
            &t,
            MenuOptions {
                expose_recover: false,
            },
        );
        let actions: Vec<MenuAction> = items.iter().map(|i| i.action).collect();
        assert_eq!(actions, vec![MenuAction::Clean]);
    }

    #[test]
    fn test_broken_menu_disables_branch_mutations() {
        let t = task("t1", TaskStatus::Broken);
        let items = build_menu(&t, MenuOptions::default());

        let disabled: Vec<MenuAction> = items
            .iter()
            .filter(|i| !i.enabled)
            .map(|i| i.action)
            .collect();
        assert_eq!(
            disabled,
            vec![
                MenuAction::Sync,
                MenuAction::Merge,
                MenuAction::Rebase,
                MenuAction::Archive
            ]
        );
    }

    #[test]
    fn test_live_menu_is_fully_enabled() {
        let t = task("t1", TaskStatus::Live);
        let items = build_menu(&t, MenuOptions::default());
        assert!(items.iter().all(|i| i.enabled));
        assert!(items.iter().any(|i| i.action == MenuAction::CopyBranch));
    }
}
