//! Fixed inventory of presence colors.

/// Colors handed out to clients, in the order they are assigned
pub const COLORS: [&str; 14] = [
    "blue",
    "red",
    "green",
    "orange",
    "purple",
    "brown",
    "gray",
    "black",
    "chocolate",
    "crimson",
    "violet",
    "darkgreen",
    "darkblue",
    "darkcyan",
];

/// Tracks which colors are held by an active client
#[derive(Debug, Clone)]
pub struct ColorPool {
    slots: Vec<(&'static str, bool)>,
}

impl ColorPool {
    pub fn new() -> Self {
        Self {
            slots: COLORS.iter().map(|color| (*color, false)).collect(),
        }
    }

    /// Take the first free color; an empty string once the pool is exhausted
    pub fn acquire(&mut self) -> String {
        match self.slots.iter_mut().find(|(_, taken)| !*taken) {
            Some((color, taken)) => {
                *taken = true;
                color.to_string()
            },
            None => String::new(),
        }
    }

    /// Give a color back. Unknown or free colors are ignored.
    pub fn release(&mut self, color: &str) {
        if let Some((_, taken)) = self.slots.iter_mut().find(|(c, _)| *c == color) {
            *taken = false;
        }
    }

    pub fn available(&self) -> usize {
        self.slots.iter().filter(|(_, taken)| !*taken).count()
    }
}

impl Default for ColorPool {
    fn default() -> Self {
        Self::new()
    }
}
