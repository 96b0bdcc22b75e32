use crate::environment::Environment;
use crate::registry::{filter_by_text, Registry, SortOrder};
use crate::video::VideoMeta;

/// The explore grid: every video in the registry, sorted and searched.
pub struct ExploreView {
    registry: Registry,
    sort: SortOrder,
    search: String,
}

impl ExploreView {
    pub fn new(environment: &Environment) -> Self {
        Self {
            registry: environment.registry.clone(),
            sort: SortOrder::Recent,
            search: String::new(),
        }
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_owned();
    }

    /// The videos to show, read fresh from the registry.
    pub fn videos(&self) -> Vec<VideoMeta> {
        filter_by_text(self.registry.list_by(self.sort), &self.search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Session;
    use crate::registry::tests::video;
    use crate::views::tests::environment;

    fn ids(videos: &[VideoMeta]) -> Vec<&str> {
        videos.iter().map(|video| video.id.as_str()).collect()
    }

    #[test]
    fn sorting_and_searching_combine() {
        let (_backend, environment) = environment(Session::anonymous());

        let mut cats = video("cats", "a", 1);
        cats.title = String::from("Cats on a keyboard");
        cats.like_count = 40;

        let mut dogs = video("dogs", "a", 2);
        dogs.description = String::from("Dogs chasing CATS");
        dogs.like_count = 3;

        environment.registry.insert(cats);
        environment.registry.insert(dogs);
        environment.registry.insert(video("birds", "a", 3));

        let mut explore = ExploreView::new(&environment);
        assert_eq!(ids(&explore.videos()), vec!["birds", "dogs", "cats"]);

        explore.set_sort(SortOrder::Trending);
        assert_eq!(ids(&explore.videos()), vec!["cats", "dogs", "birds"]);

        explore.set_search("cats");
        assert_eq!(ids(&explore.videos()), vec!["cats", "dogs"]);

        explore.set_sort(SortOrder::Recent);
        assert_eq!(ids(&explore.videos()), vec!["dogs", "cats"]);
    }
}
