use micro_router::route::{Group, Route, RouteTable};

const RESOURCES: [&str; 12] = [
    "contacts", "users", "orders", "invoices", "products", "teams", "projects", "tickets", "comments", "tags",
    "reports", "settings",
];

/// A named lookup against a route table of a given size.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    path: &'static str,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, path: &'static str) -> Self {
        Self { name, group, path }
    }

    pub fn small(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Small, path)
    }

    pub fn normal(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Normal, path)
    }

    pub fn large(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Large, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    /// A route table sized for this case's group.
    pub fn table(&self) -> RouteTable {
        resource_table(self.group.resources())
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

impl TestGroup {
    /// Number of resources registered, each with five routes.
    pub fn resources(self) -> usize {
        match self {
            TestGroup::Small => 2,
            TestGroup::Normal => 6,
            TestGroup::Large => RESOURCES.len(),
        }
    }
}

/// Builds a table of REST style routes under `/api/v1`, `count` resources of five routes each.
///
/// Every handler key is `resource.action` and every route is named the same way.
pub fn resource_table(count: usize) -> RouteTable {
    let mut table = RouteTable::new();
    table
        .group(Group::new("/api/v1").name_prefix("api."), |table| {
            for resource in RESOURCES.iter().take(count) {
                let handler = |action: &str| format!("{resource}.{action}");
                table.add(Route::get(format!("/{resource}"), handler("index")).name(handler("index")))?;
                table.add(Route::post(format!("/{resource}"), handler("store")).name(handler("store")))?;
                table.add(Route::get(format!("/{resource}/{{id}}"), handler("show")).name(handler("show")))?;
                table.add(Route::put(format!("/{resource}/{{id}}"), handler("update")).name(handler("update")))?;
                table.add(
                    Route::get(format!("/{resource}/{{id}}/comments/{{comment}}"), handler("comment"))
                        .name(handler("comment")),
                )?;
            }
            Ok(())
        })
        .expect("benchmark routes should be valid");
    table
}

/// Every handler key used by [`resource_table`].
pub fn handler_keys(count: usize) -> Vec<String> {
    let actions = ["index", "store", "show", "update", "comment"];
    RESOURCES.iter().take(count).flat_map(|resource| actions.iter().map(move |action| format!("{resource}.{action}"))).collect()
}
