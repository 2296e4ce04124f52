//! Simulated playthroughs of a story
//!
//! A [`StorySimulator`] walks the story graph from the start passage many
//! times, choosing among the choices of each passage according to a
//! [`Strategy`], and derives coverage and narrative-design metrics from the
//! walks.
//!
//! Every walk draws from its own ChaCha stream, derived from the base seed and
//! the walk index, and walks are merged in index order. The same story, seed
//! and options therefore always produce the same paths.
//!
//! [`StorySimulator`]: struct.StorySimulator.html
//! [`Strategy`]: enum.Strategy.html

use crate::story::{ChoiceTarget, Passage, Story};
use color_eyre::Result;
use eyre::eyre;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// How a walk picks the next choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Uniformly random choice
    Random,
    /// Head towards the least-visited passage still reachable
    BreadthFirst,
    /// Take the first choice not yet taken during this walk
    DepthFirst,
    /// Take the choice whose target has been visited the least
    LeastVisited,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Random
    }
}

impl FromStr for Strategy {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Strategy::Random),
            "breadth-first" => Ok(Strategy::BreadthFirst),
            "depth-first" => Ok(Strategy::DepthFirst),
            "least-visited" => Ok(Strategy::LeastVisited),
            other => Err(eyre!(
                "Unknown strategy \"{}\" (expected random, breadth-first, depth-first or least-visited)",
                other
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Random => "random",
            Strategy::BreadthFirst => "breadth-first",
            Strategy::DepthFirst => "depth-first",
            Strategy::LeastVisited => "least-visited",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Upper bound on the number of walks
    pub max_simulations: usize,

    /// Upper bound on the number of passages in a single walk
    pub max_depth: usize,

    pub strategy: Strategy,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions {
            max_simulations: 100,
            max_depth: 100,
            strategy: Strategy::Random,
        }
    }
}

impl SimulationOptions {
    pub fn new(max_simulations: usize) -> Self {
        SimulationOptions {
            max_simulations,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// The passages visited by each walk, in walk order
    pub paths: Vec<Vec<String>>,
    pub total_simulations: usize,
    /// Distinct visited passages over all passages
    pub coverage: f64,
    /// Total visits per visited passage
    pub passage_visits: BTreeMap<String, usize>,
    /// Visited passages without choices
    pub dead_ends: Vec<String>,
    pub unvisited_passages: Vec<String>,
    pub average_path_length: f64,
    /// Mean number of choices of the visited passages
    pub branching_factor: f64,
    /// Diversity of the walks, from 0 (one path) towards 1
    pub player_agency: f64,
    pub seed: u64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageVisitStat {
    pub passage_id: String,
    pub title: String,
    pub visits: usize,
    /// Share of walks that reached the passage, in percent
    pub percentage: f64,
}

/// Summary of a simulation in terms of the story, for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaythroughData {
    pub total_playthroughs: usize,
    pub coverage: f64,
    pub average_path_length: f64,
    pub branching_factor: f64,
    pub player_agency: f64,
    pub most_visited_passages: Vec<PassageVisitStat>,
    /// Passages reached by most walks, in the order walks reach them
    pub critical_path: Vec<String>,
    pub dead_ends: Vec<String>,
    pub unvisited_passages: Vec<String>,
}

const MOST_VISITED_LIMIT: usize = 10;

/// BFS distances from a passage to every passage reachable from it
type Reach<'a> = HashMap<&'a str, Vec<(&'a str, usize)>>;

/// State shared by all walks of a simulation; only updated between walks
struct Tally<'a> {
    visits: BTreeMap<&'a str, usize>,
    edge_uses: HashMap<(&'a str, usize), usize>,
    reach: Reach<'a>,
}

pub struct StorySimulator<'a> {
    story: &'a Story,
    seed: u64,
}

impl<'a> StorySimulator<'a> {
    /// Creates a simulator over the story. Without a seed, one is drawn at
    /// random and reported in the result.
    pub fn new(story: &'a Story, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        StorySimulator { story, seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs up to `max_simulations` walks, stopping early once every passage
    /// has been visited, unless some walk was cut off by `max_depth`
    pub fn simulate(&self, options: &SimulationOptions) -> SimulationResult {
        let total_passages = self.story.passages.len();
        let mut tally = Tally {
            visits: BTreeMap::new(),
            edge_uses: HashMap::new(),
            reach: if options.strategy == Strategy::BreadthFirst {
                self.reach()
            } else {
                HashMap::new()
            },
        };
        let mut paths: Vec<Vec<&'a str>> = Vec::new();
        let mut any_cut_off = false;

        for index in 0..options.max_simulations {
            let (path, edges, cut_off) = self.walk(index, options, &tally);
            debug!("Walk {} visited {} passage(s)", index, path.len());
            any_cut_off |= cut_off;

            for id in &path {
                *tally.visits.entry(*id).or_default() += 1;
            }
            for edge in edges {
                *tally.edge_uses.entry(edge).or_default() += 1;
            }
            paths.push(path);

            // No early stop once any walk has hit the depth limit
            if total_passages > 0 && tally.visits.len() == total_passages && !any_cut_off {
                debug!("Every passage visited after {} walk(s)", index + 1);
                break;
            }
        }

        let result = self.summarize(paths, tally.visits, options.strategy);
        info!(
            "Simulated {} walk(s) with {} strategy: {:.0}% coverage",
            result.total_simulations,
            result.strategy,
            result.coverage * 100.0
        );
        result
    }

    /// Runs one walk. Returns the visited passages, the choices taken and
    /// whether the depth limit cut the walk off.
    fn walk(
        &self,
        index: usize,
        options: &SimulationOptions,
        tally: &Tally<'a>,
    ) -> (Vec<&'a str>, Vec<(&'a str, usize)>, bool) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64);

        let mut path: Vec<&'a str> = Vec::new();
        let mut edges: Vec<(&'a str, usize)> = Vec::new();
        let mut local_visits: HashMap<&'a str, usize> = HashMap::new();
        let mut taken: HashSet<(&'a str, usize)> = HashSet::new();
        let max_depth = options.max_depth.max(1);

        let mut current = match self.story.start_passage() {
            Some(start) => start,
            None => return (path, edges, false),
        };

        loop {
            path.push(current.id.as_str());
            *local_visits.entry(current.id.as_str()).or_default() += 1;
            if current.choices.is_empty() {
                break;
            }
            if path.len() >= max_depth {
                return (path, edges, true);
            }

            let visits = |id: &str| {
                tally.visits.get(id).copied().unwrap_or(0) + local_visits.get(id).copied().unwrap_or(0)
            };
            let choice = match options.strategy {
                Strategy::Random => Some(rng.gen_range(0..current.choices.len())),
                Strategy::LeastVisited => self.least_visited(current, &path, &visits),
                Strategy::BreadthFirst => self.toward_frontier(current, &path, &visits, &tally.reach),
                Strategy::DepthFirst => {
                    Self::first_untaken(current, &taken, &tally.edge_uses)
                }
            };
            let choice = match choice {
                Some(choice) => choice,
                None => break,
            };

            taken.insert((current.id.as_str(), choice));
            edges.push((current.id.as_str(), choice));

            match self.resolve(&current.choices[choice].target, &path) {
                Some(next) => current = next,
                None => break,
            }
        }

        (path, edges, false)
    }

    /// The passage a choice leads to; `None` ends the walk
    fn resolve(&self, target: &ChoiceTarget, path: &[&'a str]) -> Option<&'a Passage> {
        match target {
            ChoiceTarget::Passage(id) => self.story.passage(id),
            ChoiceTarget::End => None,
            ChoiceTarget::Back => path
                .len()
                .checked_sub(2)
                .and_then(|i| self.story.passage(path[i])),
            ChoiceTarget::Restart => self.story.start_passage(),
        }
    }

    /// Picks the choice whose target has the fewest visits. Choices that end
    /// the walk come last; ties go to the earlier choice.
    fn least_visited<F>(&self, passage: &'a Passage, path: &[&'a str], visits: &F) -> Option<usize>
    where
        F: Fn(&str) -> usize,
    {
        (0..passage.choices.len()).min_by_key(|&i| {
            let score = self
                .resolve(&passage.choices[i].target, path)
                .map(|next| visits(next.id.as_str()))
                .unwrap_or(usize::MAX);
            (score, i)
        })
    }

    /// Picks the choice leading towards the least-visited passage reachable
    /// from its target, preferring nearer such passages
    fn toward_frontier<F>(
        &self,
        passage: &'a Passage,
        path: &[&'a str],
        visits: &F,
        reach: &Reach<'a>,
    ) -> Option<usize>
    where
        F: Fn(&str) -> usize,
    {
        (0..passage.choices.len()).min_by_key(|&i| {
            let frontier = self
                .resolve(&passage.choices[i].target, path)
                .and_then(|next| reach.get(next.id.as_str()))
                .and_then(|reachable| {
                    reachable
                        .iter()
                        .map(|(id, distance)| (visits(*id), *distance))
                        .min()
                })
                .unwrap_or((usize::MAX, usize::MAX));
            (frontier, i)
        })
    }

    /// Picks the first choice not yet taken during this walk, preferring the
    /// ones earlier walks used least. `None` once every choice was taken.
    fn first_untaken(
        passage: &'a Passage,
        taken: &HashSet<(&'a str, usize)>,
        edge_uses: &HashMap<(&'a str, usize), usize>,
    ) -> Option<usize> {
        let id = passage.id.as_str();
        (0..passage.choices.len())
            .filter(|i| !taken.contains(&(id, *i)))
            .min_by_key(|i| (edge_uses.get(&(id, *i)).copied().unwrap_or(0), *i))
    }

    /// Distances from every passage to each passage reachable from it
    fn reach(&self) -> Reach<'a> {
        let story = self.story;
        story
            .passages
            .values()
            .map(|from| {
                let mut distances = vec![(from.id.as_str(), 0)];
                let mut seen: HashSet<&str> = HashSet::new();
                seen.insert(from.id.as_str());
                let mut queue = VecDeque::new();
                queue.push_back((from, 0));

                while let Some((passage, distance)) = queue.pop_front() {
                    for next in story.successors(passage) {
                        if seen.insert(next) {
                            distances.push((next, distance + 1));
                            if let Some(next_passage) = story.passage(next) {
                                queue.push_back((next_passage, distance + 1));
                            }
                        }
                    }
                }

                (from.id.as_str(), distances)
            })
            .collect()
    }

    fn summarize(
        &self,
        paths: Vec<Vec<&'a str>>,
        visits: BTreeMap<&'a str, usize>,
        strategy: Strategy,
    ) -> SimulationResult {
        let story = self.story;
        let total_simulations = paths.len();
        let total_passages = story.passages.len();

        let coverage = if total_passages == 0 {
            0.0
        } else {
            visits.len() as f64 / total_passages as f64
        };

        let average_path_length = if total_simulations == 0 {
            0.0
        } else {
            paths.iter().map(|p| p.len()).sum::<usize>() as f64 / total_simulations as f64
        };

        let visited: Vec<&Passage> = visits.keys().filter_map(|id| story.passage(id)).collect();
        let branching_factor = if visited.is_empty() {
            0.0
        } else {
            visited.iter().map(|p| p.choices.len()).sum::<usize>() as f64 / visited.len() as f64
        };

        let dead_ends = visited
            .iter()
            .filter(|p| p.choices.is_empty())
            .map(|p| p.id.clone())
            .collect();

        let unvisited_passages = story
            .passages
            .keys()
            .filter(|id| !visits.contains_key(id.as_str()))
            .cloned()
            .collect();

        let signatures: BTreeSet<&Vec<&str>> = paths.iter().filter(|p| !p.is_empty()).collect();
        let player_agency = if signatures.len() > 1 {
            1.0 - 1.0 / signatures.len() as f64
        } else {
            0.0
        };

        SimulationResult {
            paths: paths
                .iter()
                .map(|p| p.iter().map(|id| id.to_string()).collect())
                .collect(),
            total_simulations,
            coverage,
            passage_visits: visits
                .into_iter()
                .map(|(id, count)| (id.to_string(), count))
                .collect(),
            dead_ends,
            unvisited_passages,
            average_path_length,
            branching_factor,
            player_agency,
            seed: self.seed,
            strategy,
        }
    }

    /// Derives the presentation summary of a simulation
    pub fn to_playthrough_data(result: &SimulationResult, story: &Story) -> PlaythroughData {
        let total = result.total_simulations;

        // passage -> (walks reaching it, sum of first-visit indices)
        let mut reached: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for path in &result.paths {
            let mut seen = HashSet::new();
            for (index, id) in path.iter().enumerate() {
                if seen.insert(id.as_str()) {
                    let entry = reached.entry(id.as_str()).or_default();
                    entry.0 += 1;
                    entry.1 += index;
                }
            }
        }

        let percentage = |walks: usize| {
            if total == 0 {
                0.0
            } else {
                walks as f64 * 100.0 / total as f64
            }
        };

        let mut most_visited: Vec<PassageVisitStat> = result
            .passage_visits
            .iter()
            .map(|(id, visits)| PassageVisitStat {
                passage_id: id.clone(),
                title: story
                    .passage(id)
                    .map(|p| p.title.clone())
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| id.clone()),
                visits: *visits,
                percentage: percentage(reached.get(id.as_str()).map_or(0, |r| r.0)),
            })
            .collect();
        most_visited.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.visits.cmp(&a.visits))
                .then_with(|| a.passage_id.cmp(&b.passage_id))
        });
        most_visited.truncate(MOST_VISITED_LIMIT);

        let mut critical: Vec<(f64, &str)> = reached
            .iter()
            .filter(|(_, (walks, _))| walks * 2 > total)
            .map(|(id, (walks, index_sum))| (*index_sum as f64 / *walks as f64, *id))
            .collect();
        critical.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        PlaythroughData {
            total_playthroughs: total,
            coverage: result.coverage,
            average_path_length: result.average_path_length,
            branching_factor: result.branching_factor,
            player_agency: result.player_agency,
            most_visited_passages: most_visited,
            critical_path: critical.into_iter().map(|(_, id)| id.to_string()).collect(),
            dead_ends: result.dead_ends.clone(),
            unvisited_passages: result.unvisited_passages.clone(),
        }
    }
}
