use scraper::{ElementRef, Html, Selector};

use crate::{error::MonitorError, types::PlayerRecord, utils};

/// Everything the parser assumes about the leaderboard page. A change on the
/// site side should only ever need an edit here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutContract {
    /// Text that identifies the tables we care about.
    pub marker: &'static str,
    pub expected_tables: usize,
    pub leaderboard_table: usize,
    pub header_rows: usize,
    pub cells_per_row: usize,
    pub level_rank_cell: usize,
    pub player_cell: usize,
    pub level_cell: usize,
    pub experience_cell: usize,
}

impl Default for LayoutContract {
    fn default() -> Self {
        Self {
            marker: "Rank",
            expected_tables: 2,
            leaderboard_table: 1,
            header_rows: 2,
            cells_per_row: 6,
            level_rank_cell: 1,
            player_cell: 3,
            level_cell: 4,
            experience_cell: 5,
        }
    }
}

impl LayoutContract {
    fn check_tables(&self, found: usize) -> Result<(), MonitorError> {
        if found != self.expected_tables {
            return Err(MonitorError::Layout(format!(
                "expected {} tables containing {:?}, found {}",
                self.expected_tables, self.marker, found
            )));
        }
        Ok(())
    }

    fn check_cells(&self, row: usize, found: usize) -> Result<(), MonitorError> {
        if found != self.cells_per_row {
            return Err(MonitorError::Layout(format!(
                "row {} has {} cells, expected {}",
                row, found, self.cells_per_row
            )));
        }
        Ok(())
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

pub struct HighscoreParser {
    contract: LayoutContract,
    table: Selector,
    cell: Selector,
    name: Selector,
    vocation: Selector,
}

impl Default for HighscoreParser {
    fn default() -> Self {
        Self::new(LayoutContract::default())
    }
}

impl HighscoreParser {
    pub fn new(contract: LayoutContract) -> Self {
        Self {
            contract,
            table: selector("table"),
            cell: selector("td"),
            name: selector("span"),
            vocation: selector("small"),
        }
    }

    pub fn contract(&self) -> &LayoutContract {
        &self.contract
    }

    pub fn parse(&self, html: &str) -> Result<Vec<PlayerRecord>, MonitorError> {
        let document = Html::parse_document(html);

        let tables: Vec<ElementRef> = document
            .select(&self.table)
            .filter(|table| table.text().collect::<String>().contains(self.contract.marker))
            .collect();
        self.contract.check_tables(tables.len())?;
        let leaderboard = *tables.get(self.contract.leaderboard_table).ok_or_else(|| {
            MonitorError::Layout(format!("no table at index {}", self.contract.leaderboard_table))
        })?;

        let mut players = Vec::new();
        for (index, row) in table_rows(leaderboard)
            .into_iter()
            .enumerate()
            .skip(self.contract.header_rows)
        {
            players.push(self.parse_row(index, row)?);
        }

        Ok(players)
    }

    fn parse_row(&self, index: usize, row: ElementRef) -> Result<PlayerRecord, MonitorError> {
        let cells: Vec<ElementRef> = row.select(&self.cell).collect();
        self.contract.check_cells(index, cells.len())?;

        let cell = |position: usize| {
            cells.get(position).copied().ok_or_else(|| {
                MonitorError::Layout(format!("row {} has no cell {}", index, position))
            })
        };

        let player_cell = cell(self.contract.player_cell)?;
        let name_el = player_cell.select(&self.name).next().ok_or_else(|| {
            MonitorError::Layout(format!("row {} has no player name element", index))
        })?;
        let name = utils::clean_text(&name_el.text().collect::<String>());
        if name.is_empty() {
            return Err(MonitorError::extraction("name", ""));
        }
        let online = utils::is_online(name_el.value().attr("style"));
        let vocation = player_cell
            .select(&self.vocation)
            .next()
            .map(|el| utils::clean_text(&el.text().collect::<String>()))
            .ok_or_else(|| MonitorError::Layout(format!("row {} has no vocation element", index)))?;

        let experience = utils::parse_experience(&cell_text(cell(self.contract.experience_cell)?))?;
        let level = utils::parse_level(&cell_text(cell(self.contract.level_cell)?))?;
        let level_rank = utils::parse_level_rank(&cell_text(cell(self.contract.level_rank_cell)?))?;

        Ok(PlayerRecord {
            name,
            online,
            vocation,
            experience,
            level,
            level_rank,
        })
    }
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect()
}

// Rows belonging to `table` itself. The HTML parser wraps bare rows in an
// implicit tbody, so look one level down as well, but never into nested tables.
fn table_rows(table: ElementRef) -> Vec<ElementRef> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}
