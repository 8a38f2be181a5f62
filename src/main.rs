//! Basketball stat projection CLI
//!
//! Projects a player's next-game line from weighted recent form and
//! opponent matchups, and trains per-stat regression models.

use clap::{Parser, Subcommand};
use hoops::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "NBA player stat projections from recent form and matchups", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Cache directory for API responses
    #[arg(long, global = true)]
    cache: Option<String>,

    /// Use only cached responses (no network requests)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a player's next-game stat line
    Project {
        /// Player name or part of it
        player: String,
        /// Opponent abbreviation or full name
        #[arg(long)]
        opponent: Option<String>,
        /// Number of recent games to weight
        #[arg(long)]
        games: Option<usize>,
        /// Season, e.g. 2023-24
        #[arg(long)]
        season: Option<String>,
        /// Pick among ambiguous player matches (1-based)
        #[arg(long)]
        pick: Option<usize>,
        /// Pick among ambiguous opponent matches (1-based)
        #[arg(long)]
        opponent_pick: Option<usize>,
        /// Skip writing the projection CSV
        #[arg(long)]
        no_csv: bool,
    },
    /// Show league-wide team rankings
    Rankings {
        /// Stat to order by
        #[arg(long, default_value = "PTS")]
        stat: hoops::Stat,
        #[arg(long)]
        season: Option<String>,
    },
    /// Prompt for players and opponents until 'quit'
    Interactive {
        #[arg(long)]
        season: Option<String>,
    },
    /// Game log download and preprocessing
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train a regression model on a preprocessed feature table
    Train {
        /// Player the model is for (used in the model name)
        player: String,
        /// Feature table CSV
        #[arg(long)]
        input: String,
        /// Target stat
        #[arg(long, default_value = "PTS")]
        target: hoops::Stat,
        /// Model family: linear or forest
        #[arg(long, default_value = "forest")]
        model: hoops::training::ModelKind,
        /// Comma-separated feature columns (default: all)
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,
        /// Override number of epochs (linear)
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Predict next-game stats with saved models
    Predict {
        player: String,
        /// Game log CSV
        #[arg(long)]
        input: String,
        /// Comma-separated target stats
        #[arg(long, value_delimiter = ',', default_value = "PTS,REB,AST")]
        targets: Vec<hoops::Stat>,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Download a player's game logs to CSV
    Fetch {
        /// Player name or part of it
        player: String,
        /// First season start year
        #[arg(long)]
        from: Option<u16>,
        /// Last season start year
        #[arg(long)]
        to: Option<u16>,
        #[arg(long)]
        pick: Option<usize>,
        /// Output CSV path
        #[arg(long)]
        output: Option<String>,
    },
    /// Build the rolling-average feature table from a game log CSV
    Preprocess {
        input: String,
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let mut config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };
    if cli.cache.is_some() {
        config.api.cache_dir = cli.cache.clone();
    }
    if cli.offline {
        config.api.offline = true;
    }

    let result = match cli.command {
        Commands::Project {
            player,
            opponent,
            games,
            season,
            pick,
            opponent_pick,
            no_csv,
        } => commands::project(
            &config,
            &player,
            opponent,
            games,
            season,
            (pick, opponent_pick),
            !no_csv,
        ),
        Commands::Rankings { stat, season } => commands::rankings(&config, stat, season),
        Commands::Interactive { season } => commands::interactive(&config, season),
        Commands::Data { action } => match action {
            DataCommands::Fetch {
                player,
                from,
                to,
                pick,
                output,
            } => commands::data_fetch(&config, &player, from, to, pick, output),
            DataCommands::Preprocess { input, output } => {
                commands::data_preprocess(&input, output)
            }
        },
        Commands::Train {
            player,
            input,
            target,
            model,
            features,
            epochs,
        } => commands::train(&config, &player, &input, target, model, features, epochs),
        Commands::Predict {
            player,
            input,
            targets,
        } => commands::predict(&config, &player, &input, &targets),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hoops::data::csv_io::{read_game_log, write_game_log};
    use hoops::data::{NbaStatsClient, StatsSource};
    use hoops::features::rankings::RankingsCache;
    use hoops::features::rolling::{preprocess, FeatureTable};
    use hoops::predict::{find_player, player_games, project as run_projection, report, Predictor};
    use hoops::selection::{match_opponent, opponent_candidates, Selection};
    use hoops::training::{model_path, train_model, ModelKind};
    use hoops::{HoopsError, Player, Season, Stat, Team};
    use std::io::{BufRead, Write};
    use std::path::{Path, PathBuf};

    fn client(config: &Config) -> Result<NbaStatsClient> {
        NbaStatsClient::new(&config.api, &config.projection.season_type)
    }

    fn season_or_default(config: &Config, season: Option<String>) -> Result<Season> {
        match season {
            Some(s) => Season::parse(&s),
            None => config.season(),
        }
    }

    fn print_candidates<T: std::fmt::Display>(items: &[T]) {
        for (i, item) in items.iter().enumerate() {
            println!("  {}. {}", i + 1, item);
        }
    }

    fn describe(player: &Player) -> String {
        match player.position {
            Some(p) => format!("{} ({})", player.name, p),
            None => player.name.clone(),
        }
    }

    fn select_player(
        source: &NbaStatsClient,
        config: &Config,
        season: &Season,
        query: &str,
        pick: Option<usize>,
    ) -> Result<Player> {
        let selection = find_player(source, season, query, config.projection.max_candidates)?;
        if let (Selection::Ambiguous(players), None) = (&selection, pick) {
            println!("Multiple players match '{}':", query);
            let names: Vec<String> = players.iter().map(describe).collect();
            print_candidates(&names);
        }
        selection.resolve(pick, &format!("player matching '{}'", query))
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all(&config.data.data_dir)?;
        std::fs::create_dir_all(&config.data.model_dir)?;
        println!(
            "Created {}/ and {}/ directories",
            config.data.data_dir, config.data.model_dir
        );

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hoops project \"LeBron James\" --opponent BOS' for a projection");
        println!("  3. Run 'hoops data fetch \"LeBron James\"' to download game logs");
        println!("  4. Run 'hoops train \"LeBron James\" --input <features.csv>' to fit a model");

        Ok(())
    }

    pub fn project(
        config: &Config,
        query: &str,
        opponent: Option<String>,
        games: Option<usize>,
        season: Option<String>,
        (pick, opponent_pick): (Option<usize>, Option<usize>),
        write_csv: bool,
    ) -> Result<()> {
        let season = season_or_default(config, season)?;
        let window = games.unwrap_or(config.projection.games);
        let source = client(config)?;

        let player = select_player(&source, config, &season, query, pick)?;
        let log = player_games(&source, &player, &season)?;

        let opponent = match opponent {
            Some(name) => {
                let teams = source.teams()?;
                let selection = match_opponent(&teams, &name);
                if let (Selection::Ambiguous(matches), None) = (&selection, opponent_pick) {
                    println!("Multiple teams match '{}' (use --opponent-pick):", name);
                    print_candidates(matches);
                }
                Some(selection.resolve(opponent_pick, &format!("team '{}'", name))?)
            }
            None => None,
        };

        let mut rankings = RankingsCache::new();
        let analysis = run_projection(
            &source,
            &mut rankings,
            &player,
            &log,
            opponent.as_ref(),
            &season,
            window,
        )?;

        if let Some(profile) = &analysis.opponent_profile {
            println!("\n{}", report::format_opponent_profile(profile));
        }
        if let Some(delta) = &analysis.matchup {
            println!("{}", report::format_matchup(delta));
        }
        println!("{}", report::format_analysis(&analysis));

        if write_csv {
            let path = report::write_projection_csv(Path::new(&config.data.output_dir), &analysis)?;
            println!("Projected stats saved to '{}'.", path.display());
        }
        Ok(())
    }

    pub fn rankings(config: &Config, stat: Stat, season: Option<String>) -> Result<()> {
        let season = season_or_default(config, season)?;
        let source = client(config)?;
        let mut cache = RankingsCache::new();
        let rankings = cache.get_or_compute(&source, &season)?;
        if rankings.is_empty() {
            println!("No team games found for {}.", season);
            return Ok(());
        }
        println!("{}", report::format_rankings(rankings, stat));
        Ok(())
    }

    fn prompt(input: &mut impl BufRead, message: &str) -> Result<Option<String>> {
        print!("{}", message);
        std::io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt_opponent(input: &mut impl BufRead, candidates: &[Team]) -> Result<Option<Team>> {
        if candidates.is_empty() {
            println!("No opponents found in the game log.");
            return Ok(None);
        }
        println!("\nOpponents faced this season:");
        print_candidates(candidates);
        let answer = prompt(input, "Choose an opponent by number or name (blank for none): ")?
            .unwrap_or_default();
        if answer.is_empty() {
            return Ok(None);
        }
        if let Ok(n) = answer.parse::<usize>() {
            return Selection::Ambiguous(candidates.to_vec())
                .resolve(Some(n), "opponent")
                .map(Some);
        }
        match match_opponent(candidates, &answer) {
            Selection::Ambiguous(teams) => {
                println!("'{}' matches several teams:", answer);
                print_candidates(&teams);
                let n = prompt(input, "Choose a number: ")?.unwrap_or_default();
                let n = n
                    .parse::<usize>()
                    .map_err(|_| HoopsError::InvalidSelection(format!("'{}' is not a number", n)))?;
                Selection::Ambiguous(teams).resolve(Some(n), "opponent").map(Some)
            }
            other => other.resolve(None, &format!("opponent '{}'", answer)).map(Some),
        }
    }

    fn interactive_round(
        source: &NbaStatsClient,
        config: &Config,
        season: &Season,
        rankings: &mut RankingsCache,
        input: &mut impl BufRead,
        query: &str,
    ) -> Result<()> {
        let games = prompt(
            input,
            &format!(
                "Enter the number of recent games to analyze (default is {}): ",
                config.projection.games
            ),
        )?
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(config.projection.games);

        let player = match find_player(source, season, query, config.projection.max_candidates)? {
            Selection::Ambiguous(players) => {
                println!("Multiple players found:");
                let names: Vec<String> = players.iter().map(describe).collect();
                print_candidates(&names);
                let n = prompt(input, "Select the player number: ")?.unwrap_or_default();
                let n = n
                    .parse::<usize>()
                    .map_err(|_| HoopsError::InvalidSelection(format!("'{}' is not a number", n)))?;
                Selection::Ambiguous(players).resolve(Some(n), "player")?
            }
            other => other.resolve(None, &format!("player matching '{}'", query))?,
        };

        let log = player_games(source, &player, season)?;
        let teams = source.teams()?;
        let opponent = prompt_opponent(input, &opponent_candidates(&log, &teams))?;

        let analysis = run_projection(
            source,
            rankings,
            &player,
            &log,
            opponent.as_ref(),
            season,
            games,
        )?;

        if let Some(profile) = &analysis.opponent_profile {
            println!("\n{}", report::format_opponent_profile(profile));
        }
        if let Some(delta) = &analysis.matchup {
            println!("{}", report::format_matchup(delta));
        }
        println!("{}", report::format_analysis(&analysis));
        let path = report::write_projection_csv(Path::new(&config.data.output_dir), &analysis)?;
        println!("Projected stats saved to '{}'.", path.display());
        Ok(())
    }

    pub fn interactive(config: &Config, season: Option<String>) -> Result<()> {
        let season = season_or_default(config, season)?;
        let source = client(config)?;
        let mut rankings = RankingsCache::new();
        let stdin = std::io::stdin();
        let mut input = stdin.lock();

        // Rankings are fetched once and reused for every player
        if let Err(e) = rankings.get_or_compute(&source, &season) {
            log::warn!("Failed to fetch league team rankings: {}", e);
        }

        loop {
            let Some(query) = prompt(
                &mut input,
                "\nEnter the player's name or last name (or type 'quit' to exit): ",
            )?
            else {
                break;
            };
            if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
                println!("Exiting the program.");
                break;
            }
            if query.is_empty() {
                continue;
            }

            if let Err(e) = interactive_round(&source, config, &season, &mut rankings, &mut input, &query) {
                println!("{}", e);
            }
        }
        Ok(())
    }

    fn slug(name: &str) -> String {
        name.trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    pub fn data_fetch(
        config: &Config,
        query: &str,
        from: Option<u16>,
        to: Option<u16>,
        pick: Option<usize>,
        output: Option<String>,
    ) -> Result<()> {
        let current = config.season()?;
        let source = client(config)?;
        let player = select_player(&source, config, &current, query, pick)?;

        let last = to.unwrap_or(current.start_year());
        let first = from.unwrap_or(last);
        if first > last {
            return Err(HoopsError::Config(format!(
                "--from {} is after --to {}",
                first, last
            )));
        }

        println!("Fetching {} seasons for {}...", last - first + 1, player.name);
        let mut games = Vec::new();
        for year in first..=last {
            let season = Season::from_start_year(year);
            match source.player_game_log(player.id, &season) {
                Ok(log) => {
                    log::info!("{}: {} games", season, log.len());
                    games.extend(log);
                }
                Err(e) => {
                    log::warn!("Error fetching data for season {}: {}", season, e);
                    continue;
                }
            }
        }

        if games.is_empty() {
            println!("No data fetched.");
            return Ok(());
        }
        games.sort_by_key(|g| g.date);

        let path = output.map(PathBuf::from).unwrap_or_else(|| {
            Path::new(&config.data.data_dir).join(format!("{}_stats.csv", slug(&player.name)))
        });
        write_game_log(&path, &games)?;
        println!("{} game logs saved to {}", games.len(), path.display());
        Ok(())
    }

    pub fn data_preprocess(input: &str, output: Option<String>) -> Result<()> {
        let games = read_game_log(input)?;
        println!("Loaded {} games from {}", games.len(), input);

        let table = preprocess(&games);
        if table.is_empty() {
            println!("Not enough games to build rolling features (need more than 10).");
            return Ok(());
        }

        let path = output.map(PathBuf::from).unwrap_or_else(|| {
            let input = Path::new(input);
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("games");
            input.with_file_name(format!("{}_processed.csv", stem))
        });
        table.write_csv(&path)?;
        println!("{} feature rows saved to {}", table.len(), path.display());
        Ok(())
    }

    pub fn train(
        config: &Config,
        player: &str,
        input: &str,
        target: Stat,
        kind: ModelKind,
        features: Option<Vec<String>>,
        epochs: Option<usize>,
    ) -> Result<()> {
        let mut table = FeatureTable::read_csv(input)?;
        if let Some(columns) = features {
            table = table.select(&columns)?;
        }
        println!(
            "Training {} for {} on {} rows ({} features)",
            kind,
            target,
            table.len(),
            table.columns.len()
        );

        let mut training = config.training.clone();
        if let Some(epochs) = epochs {
            training.epochs = epochs;
        }

        let model = train_model(&table, target, kind, &training)?;
        println!("\n{}", report::format_training(&model));

        let dir = model_path(Path::new(&config.data.model_dir), player, target);
        model.save(&dir)?;
        println!("Model saved to {}", dir.display());
        Ok(())
    }

    pub fn predict(config: &Config, player: &str, input: &str, targets: &[Stat]) -> Result<()> {
        let games = read_game_log(input)?;
        if games.is_empty() {
            return Err(HoopsError::Parse(format!("{} has no games", input)));
        }

        let predictor = Predictor::new(&config.data.model_dir, player);
        let predictions = predictor.predict(&games, targets)?;
        if predictions.is_empty() {
            println!(
                "No saved models for {} in {}. Run 'hoops train' first.",
                player, config.data.model_dir
            );
            return Ok(());
        }
        println!("{}", report::format_predictions(player, &predictions));
        Ok(())
    }
}
