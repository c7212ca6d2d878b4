pub const SEARCH_ANIME: &str = r#"
query SearchAnime($search: String!, $perPage: Int) {
  Page(perPage: $perPage) {
    media(search: $search, type: ANIME) {
      id
      title { romaji english }
      coverImage { medium }
      format
      episodes
      averageScore
      seasonYear
      status
    }
  }
}
"#;

pub const ANIME_DETAILS: &str = r#"
query AnimeDetails($id: Int!) {
  Media(id: $id, type: ANIME) {
    id
    title { romaji english native }
    description(asHtml: true)
    coverImage { large extraLarge }
    bannerImage
    season
    seasonYear
    format
    episodes
    duration
    status
    genres
    averageScore
    popularity
    studios(isMain: true) { nodes { id name } }
    characters(sort: ROLE, perPage: 6) {
      edges {
        node { id name { full } image { medium large } }
        role
      }
    }
    recommendations(perPage: 5) {
      nodes {
        mediaRecommendation {
          id
          title { romaji }
          coverImage { medium large }
          seasonYear
          format
          averageScore
        }
      }
    }
    tags { id name rank }
    externalLinks { id url site }
    trailer { id site thumbnail }
    startDate { year month day }
    endDate { year month day }
  }
}
"#;
