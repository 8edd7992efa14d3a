use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        let sources = self.context_sources();
        println!("Current configuration:");
        println!("  bind: {}", self.bind_address());
        println!("  model: {}", self.model());
        println!("  base-url: {}", self.base_url());
        println!("  text-source: {}", path_display(&sources.text_path));
        println!("  ontology-source: {}", path_display(&sources.ontology_path));
        match Self::get_config_path() {
            Some(path) => println!("  config-file: {}", path_display(path)),
            None => println!("  config-file: (unavailable)"),
        }
    }
}
