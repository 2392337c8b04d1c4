/*!

This is the long-form manual for `poll_explorer` and `pollscope`.

## Input tables

Two tables are loaded once at startup:

* the **ratings table**, one row per pollster: `pollster`, `rank`,
  `numeric_grade`, `POLLSCORE`, `wtd_avg_transparency`,
  `number_polls_pollster_total`, `error_ppm`, `bias_ppm`. Note that the
  published export spells the pollscore column in upper case.
* the **poll table**, one row per poll question: `poll_id`, `question_id`,
  `pollster`, `cycle`, `race`, `location`, `methodology`, `margin_poll`,
  `margin_actual`, `samplesize`, `polldate`.

Dates are accepted in ISO form (`2020-11-03`) and in the archive's short
form (`11/3/20`). A row with an unparseable date or a negative sample size
is excluded from the working set and counted in the load report; it never
aborts the load. A missing methodology becomes `"Unknown Method"` at load
time, once.

## The cascade

A session always selects a pollster first. The four remaining dimensions
are applied in a fixed priority order:

```text
cycle -> race -> location -> methodology
```

Each dimension's option list is computed from the subset narrowed by
everything upstream of it, ignoring its own current selection. Picking
`cycle=2020` therefore restricts the race options to races the pollster
actually polled in 2020, while both cycles remain on offer for reverting.

Selecting a new pollster resets every other dimension. A selection that an
upstream change has made stale is treated as unset rather than producing an
empty dead end.

## Outputs

Every resolution pass produces the filtered record subset, the four option
lists, distinct poll and question counts, the pollster's rating summary
row, and a long-form series with two points per record (`margin_poll` and
`margin_actual`, weighted by sample size) ready for a scatter plot over
time.

*/
